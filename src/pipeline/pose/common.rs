use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use super::EstimationConfig;
use crate::types::{BodyPart, Frame, Pose};

pub const MULTIPOSE_INPUT_SIZE: u32 = 256;
pub const SINGLEPOSE_INPUT_SIZE: u32 = 192;

/// Values per multipose detection: 17 × (y, x, score) followed by the box and its score.
pub const MULTIPOSE_STRIDE: usize = BodyPart::COUNT * 3 + 5;

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub input_size: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl LetterboxInfo {
    /// Maps a normalized model coordinate back into frame pixels.
    pub fn project(&self, norm_x: f32, norm_y: f32) -> (f32, f32) {
        let size = self.input_size as f32;
        let px = (norm_x * size - self.pad_x) / self.scale;
        let py = (norm_y * size - self.pad_y) / self.scale;
        (
            px.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            py.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }
}

/// Resizes the frame into a square, zero-padded RGB tensor of `target_size`. MoveNet takes
/// raw 0..255 values as int32.
pub fn prepare_frame(frame: &Frame, target_size: u32) -> Result<(Array4<i32>, LetterboxInfo)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let mut canvas = vec![0u8; (target_size as usize) * (target_size as usize) * 4];
    let dst_stride = target_size as usize * 4;
    let src_stride = new_w as usize * 4;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 4;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let rgb: Vec<i32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| [px[0] as i32, px[1] as i32, px[2] as i32])
        .collect();
    let input = Array4::<i32>::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        rgb,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        input_size: target_size,
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

fn pose_from_yxs(values: &[f32], score: f32, letterbox: &LetterboxInfo) -> Pose {
    let mut triples = [(0.0, 0.0, 0.0); BodyPart::COUNT];
    for (slot, chunk) in triples.iter_mut().zip(values.chunks_exact(3)) {
        let (x, y) = letterbox.project(chunk[1], chunk[0]);
        *slot = (x, y, chunk[2]);
    }
    Pose::from_triples(&triples, score)
}

/// Decodes the `[1, 6, 56]` multipose output.
pub fn decode_multipose(flat: &[f32], letterbox: &LetterboxInfo) -> Result<Vec<Pose>> {
    if flat.is_empty() || flat.len() % MULTIPOSE_STRIDE != 0 {
        return Err(anyhow!(
            "unexpected multipose output length {} (stride {MULTIPOSE_STRIDE})",
            flat.len()
        ));
    }
    Ok(flat
        .chunks_exact(MULTIPOSE_STRIDE)
        .map(|det| {
            let score = det[MULTIPOSE_STRIDE - 1];
            pose_from_yxs(&det[..BodyPart::COUNT * 3], score, letterbox)
        })
        .collect())
}

/// Decodes the `[1, 1, 17, 3]` singlepose output. The model has no pose score, so the mean
/// keypoint score stands in for it.
pub fn decode_singlepose(flat: &[f32], letterbox: &LetterboxInfo) -> Result<Vec<Pose>> {
    if flat.len() < BodyPart::COUNT * 3 {
        return Err(anyhow!(
            "unexpected singlepose output length: got {}, need {}",
            flat.len(),
            BodyPart::COUNT * 3
        ));
    }
    let values = &flat[..BodyPart::COUNT * 3];
    let score = values.chunks_exact(3).map(|c| c[2]).sum::<f32>() / BodyPart::COUNT as f32;
    Ok(vec![pose_from_yxs(values, score, letterbox)])
}

/// Applies the caller's estimation settings to raw detections: score threshold, duplicate
/// suppression, optional horizontal flip and the pose cap. Output is sorted by score.
pub fn postprocess(mut poses: Vec<Pose>, frame_width: u32, config: &EstimationConfig) -> Vec<Pose> {
    poses.retain(|pose| pose.score >= config.score_threshold);
    poses.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Pose> = Vec::with_capacity(config.max_poses);
    for pose in poses {
        if kept.len() >= config.max_poses {
            break;
        }
        if kept
            .iter()
            .any(|other| overlaps(&pose, other, config.nms_radius))
        {
            continue;
        }
        kept.push(pose);
    }

    if config.flip_horizontal {
        let max_x = frame_width.saturating_sub(1) as f32;
        kept = kept.into_iter().map(|pose| flip_pose(&pose, max_x)).collect();
    }
    kept
}

/// Two detections are the same person when most of their keypoints sit within `radius`.
fn overlaps(a: &Pose, b: &Pose, radius: f32) -> bool {
    let close = a
        .keypoints()
        .iter()
        .zip(b.keypoints())
        .filter(|(ka, kb)| ka.distance_to(kb) <= radius)
        .count();
    close * 2 > BodyPart::COUNT
}

fn flip_pose(pose: &Pose, max_x: f32) -> Pose {
    let mut triples = [(0.0, 0.0, 0.0); BodyPart::COUNT];
    for (slot, kp) in triples.iter_mut().zip(pose.keypoints()) {
        *slot = (max_x - kp.x, kp.y, kp.score);
    }
    Pose::from_triples(&triples, pose.score)
}
