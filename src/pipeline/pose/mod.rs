mod common;
mod movenet;

use std::path::Path;

use anyhow::Result;

use crate::{
    config::PoseModelKind,
    types::{Frame, Pose},
};

/// Settings passed to the pose model on every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimationConfig {
    pub max_poses: usize,
    pub flip_horizontal: bool,
    pub score_threshold: f32,
    /// Detections whose keypoints mostly fall within this many pixels of a better detection
    /// are dropped.
    pub nms_radius: f32,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            max_poses: 5,
            flip_horizontal: false,
            score_threshold: 0.5,
            nms_radius: 20.0,
        }
    }
}

pub trait PoseEstimator: Send + 'static {
    fn estimate(&mut self, frame: &Frame, config: &EstimationConfig) -> Result<Vec<Pose>>;
}

pub fn load_estimator(kind: PoseModelKind, model_path: &Path) -> Result<Box<dyn PoseEstimator>> {
    log::info!("loading {} from {}", kind.label(), model_path.display());
    Ok(Box::new(movenet::MoveNet::new(kind, model_path)?))
}
