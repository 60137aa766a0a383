use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    EstimationConfig, PoseEstimator,
    common::{self, MULTIPOSE_INPUT_SIZE, SINGLEPOSE_INPUT_SIZE},
};
use crate::{
    config::PoseModelKind,
    types::{Frame, Pose},
};

pub struct MoveNet {
    kind: PoseModelKind,
    session: Session,
}

impl MoveNet {
    pub fn new(kind: PoseModelKind, model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;
        Ok(Self { kind, session })
    }

    fn input_size(&self) -> u32 {
        match self.kind {
            PoseModelKind::MoveNetMultipose => MULTIPOSE_INPUT_SIZE,
            PoseModelKind::MoveNetSinglepose => SINGLEPOSE_INPUT_SIZE,
        }
    }
}

impl PoseEstimator for MoveNet {
    fn estimate(&mut self, frame: &Frame, config: &EstimationConfig) -> Result<Vec<Pose>> {
        let (input, letterbox) = common::prepare_frame(frame, self.input_size())?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let raw = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = raw.iter().copied().collect();
        let poses = match self.kind {
            PoseModelKind::MoveNetMultipose => common::decode_multipose(&flattened, &letterbox)?,
            PoseModelKind::MoveNetSinglepose => common::decode_singlepose(&flattened, &letterbox)?,
        };

        Ok(common::postprocess(poses, frame.width, config))
    }
}
