pub mod client;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BodyPart, Pose};

pub use client::MagickClient;

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("requested {requested} effect options but the catalog only has {available}")]
    CatalogTooSmall { requested: usize, available: usize },
    #[error("effect service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("effect service returned an undecodable image: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Extra argument of an ImageMagick operator, sent either as text or as a number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectArg {
    Number(i64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectOption {
    pub display_name: &'static str,
    pub channel: Option<&'static str>,
    pub cmd: &'static str,
    pub cfg: Option<EffectArg>,
}

impl EffectOption {
    const fn new(display_name: &'static str, cmd: &'static str) -> Self {
        Self {
            display_name,
            channel: None,
            cmd,
            cfg: None,
        }
    }
}

pub fn catalog() -> Vec<EffectOption> {
    vec![
        EffectOption {
            channel: Some("-channel RGB"),
            ..EffectOption::new("Negate Image", "-negate")
        },
        EffectOption {
            cfg: Some(EffectArg::Number(5)),
            ..EffectOption::new("Rotationally Blur Image", "-rotational-blur")
        },
        EffectOption {
            cfg: Some(EffectArg::Number(5)),
            ..EffectOption::new("Segment Image", "-segment")
        },
        EffectOption {
            cfg: Some(EffectArg::Text("75%".to_string())),
            ..EffectOption::new("Sepia-Tone Image", "-sepia-tone")
        },
        EffectOption {
            cfg: Some(EffectArg::Number(2)),
            ..EffectOption::new("Charcoal Sketch", "-charcoal")
        },
        EffectOption {
            cfg: Some(EffectArg::Number(180)),
            ..EffectOption::new("Swirl Image", "-swirl")
        },
        EffectOption {
            cfg: Some(EffectArg::Number(4)),
            ..EffectOption::new("Oil Paint Image", "-paint")
        },
        EffectOption {
            cfg: Some(EffectArg::Text("0.6".to_string())),
            ..EffectOption::new("Implode Image", "-implode")
        },
    ]
}

/// Draws `n` distinct options from `catalog` in random order.
pub fn random_options<R: Rng + ?Sized>(
    catalog: &[EffectOption],
    n: usize,
    rng: &mut R,
) -> Result<Vec<EffectOption>, EffectError> {
    if n > catalog.len() {
        return Err(EffectError::CatalogTooSmall {
            requested: n,
            available: catalog.len(),
        });
    }
    Ok(catalog.choose_multiple(rng, n).cloned().collect())
}

/// Equal-height horizontal bands covering the display, one per menu option.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionBands {
    upper_bounds: Vec<f32>,
}

impl OptionBands {
    pub fn new(count: usize, view_height: f32) -> Self {
        let upper_bounds = (1..=count)
            .map(|i| i as f32 * view_height / count as f32)
            .collect();
        Self { upper_bounds }
    }

    pub fn len(&self) -> usize {
        self.upper_bounds.len()
    }

    /// First band whose upper bound is strictly greater than `y`.
    pub fn band_for(&self, y: f32) -> Option<usize> {
        self.upper_bounds.iter().position(|&upper| y < upper)
    }

    /// Tracks the right wrist of the first pose. Without a pose, or with the wrist outside
    /// every band, the current selection is kept.
    pub fn select(&self, poses: &[Pose], current: usize) -> usize {
        poses
            .first()
            .and_then(|pose| self.band_for(pose.keypoint(BodyPart::RightWrist).y))
            .unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::tests::{standing_pose, with_part};
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn four_bands_over_full_hd() {
        let bands = OptionBands::new(4, 1080.0);
        assert_eq!(bands.len(), 4);
        assert_eq!(bands.band_for(1079.0), Some(3));
        assert_eq!(bands.band_for(0.0), Some(0));
        assert_eq!(bands.band_for(269.9), Some(0));
        assert_eq!(bands.band_for(270.0), Some(1));
        assert_eq!(bands.band_for(810.0), Some(3));
        assert_eq!(bands.band_for(1080.0), None);
    }

    #[test]
    fn selection_follows_first_pose_right_wrist() {
        let bands = OptionBands::new(4, 1080.0);
        let first = with_part(standing_pose(0.9), BodyPart::RightWrist, 100.0, 0.9);
        let second = with_part(standing_pose(0.9), BodyPart::RightWrist, 1000.0, 0.9);
        assert_eq!(bands.select(&[first, second], 2), 0);
    }

    #[test]
    fn selection_unchanged_without_pose_or_band() {
        let bands = OptionBands::new(4, 1080.0);
        assert_eq!(bands.select(&[], 2), 2);
        let below = with_part(standing_pose(0.9), BodyPart::RightWrist, 2000.0, 0.9);
        assert_eq!(bands.select(&[below], 1), 1);
    }

    #[test]
    fn random_subset_is_distinct_and_from_catalog() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(7);
        for n in 0..=catalog.len() {
            let picked = random_options(&catalog, n, &mut rng).expect("subset");
            assert_eq!(picked.len(), n);
            let names: HashSet<_> = picked.iter().map(|o| o.display_name).collect();
            assert_eq!(names.len(), n);
            assert!(picked.iter().all(|o| catalog.contains(o)));
        }
    }

    #[test]
    fn oversized_subset_is_rejected() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(1);
        let err = random_options(&catalog, catalog.len() + 1, &mut rng).unwrap_err();
        assert!(matches!(err, EffectError::CatalogTooSmall { .. }));
    }
}
