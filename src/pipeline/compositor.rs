use std::path::Path;

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::RgbaImage;

use crate::{
    overlay::{DrawCommand, raster},
    types::{BodyPart, Frame, Pose},
};

/// Scales camera frames onto the display surface and draws overlays on top of them.
pub struct Compositor {
    width: u32,
    height: u32,
    resizer: fir::Resizer,
    sprite: Option<RgbaImage>,
    background: Option<RgbaImage>,
}

impl Compositor {
    pub fn new(width: u32, height: u32, sprite: Option<RgbaImage>) -> Self {
        Self {
            width,
            height,
            resizer: fir::Resizer::new(),
            sprite,
            background: None,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_sprite(&self) -> bool {
        self.sprite.is_some()
    }

    /// Stretches the frame to the display size.
    pub fn to_display(&mut self, frame: &Frame) -> Result<RgbaImage> {
        resize_rgba(
            &mut self.resizer,
            frame.rgba.clone(),
            (frame.width, frame.height),
            (self.width, self.height),
        )
    }

    /// Keeps the first surface it is given as the wireframe backdrop.
    pub fn capture_background(&mut self, surface: &RgbaImage) {
        if self.background.is_none() {
            log::debug!("captured wireframe background");
            self.background = Some(surface.clone());
        }
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    /// Draws `commands` onto `base` and mirrors the result.
    pub fn compose(&self, mut base: RgbaImage, commands: &[DrawCommand]) -> RgbaImage {
        raster::render(&mut base, commands, self.sprite.as_ref());
        raster::mirror(&mut base);
        base
    }

    /// Mirrored copy of `surface` downscaled for upload.
    pub fn snapshot(&mut self, surface: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
        let mut mirrored = surface.clone();
        raster::mirror(&mut mirrored);
        let dims = mirrored.dimensions();
        resize_rgba(&mut self.resizer, mirrored.into_raw(), dims, (width, height))
    }
}

fn resize_rgba(
    resizer: &mut fir::Resizer,
    rgba: Vec<u8>,
    (src_w, src_h): (u32, u32),
    (dst_w, dst_h): (u32, u32),
) -> Result<RgbaImage> {
    if (src_w, src_h) == (dst_w, dst_h) {
        return RgbaImage::from_raw(dst_w, dst_h, rgba)
            .ok_or_else(|| anyhow!("frame buffer does not match {dst_w}x{dst_h}"));
    }
    let src_image = fir::images::Image::from_vec_u8(src_w, src_h, rgba, fir::PixelType::U8x4)?;
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .context("fast resize failed")?;
    RgbaImage::from_raw(dst_w, dst_h, dst_image.into_vec())
        .ok_or_else(|| anyhow!("resized buffer does not match {dst_w}x{dst_h}"))
}

/// Loads the costume head sprite.
pub fn load_sprite(path: &Path) -> Result<RgbaImage> {
    let sprite = image::open(path)
        .with_context(|| format!("failed to load head image {}", path.display()))?
        .to_rgba8();
    Ok(sprite)
}

/// Maps poses from camera pixels onto a surface of a different size.
pub fn scale_poses(poses: Vec<Pose>, from: (u32, u32), to: (u32, u32)) -> Vec<Pose> {
    if from == to || from.0 == 0 || from.1 == 0 {
        return poses;
    }
    let sx = to.0 as f32 / from.0 as f32;
    let sy = to.1 as f32 / from.1 as f32;
    poses
        .iter()
        .map(|pose| {
            let mut triples = [(0.0, 0.0, 0.0); BodyPart::COUNT];
            for (slot, kp) in triples.iter_mut().zip(pose.keypoints()) {
                *slot = (kp.x * sx, kp.y * sy, kp.score);
            }
            Pose::from_triples(&triples, pose.score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::BLUE;
    use image::Rgba;
    use std::time::Instant;

    #[test]
    fn overlays_are_mirrored_with_the_frame() {
        let compositor = Compositor::new(20, 10, None);
        let base = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        let out = compositor.compose(
            base,
            &[DrawCommand::Disc {
                center: (2.0, 5.0),
                radius: 0.5,
                color: BLUE,
            }],
        );
        assert_eq!(out.get_pixel(17, 5).0, BLUE);
        assert_eq!(out.get_pixel(2, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn frames_are_stretched_to_the_display() {
        let mut compositor = Compositor::new(40, 20, None);
        let frame = Frame {
            rgba: [90, 90, 90, 255].repeat(10 * 10),
            width: 10,
            height: 10,
            timestamp: Instant::now(),
        };
        let surface = compositor.to_display(&frame).expect("resize");
        assert_eq!(surface.dimensions(), (40, 20));
        assert_eq!(surface.get_pixel(20, 10).0, [90, 90, 90, 255]);
    }

    #[test]
    fn background_is_captured_once() {
        let mut compositor = Compositor::new(4, 4, None);
        compositor.capture_background(&RgbaImage::from_pixel(4, 4, Rgba([1, 1, 1, 255])));
        compositor.capture_background(&RgbaImage::from_pixel(4, 4, Rgba([2, 2, 2, 255])));
        assert_eq!(compositor.background().unwrap().get_pixel(0, 0).0, [1, 1, 1, 255]);
    }

    #[test]
    fn snapshot_is_downscaled() {
        let mut compositor = Compositor::new(40, 20, None);
        let surface = RgbaImage::from_pixel(40, 20, Rgba([5, 6, 7, 255]));
        let snap = compositor.snapshot(&surface, 20, 10).expect("snapshot");
        assert_eq!(snap.dimensions(), (20, 10));
        assert_eq!(snap.get_pixel(3, 3).0, [5, 6, 7, 255]);
    }

    #[test]
    fn poses_scale_with_the_surface() {
        let pose = Pose::from_triples(&[(10.0, 20.0, 0.7); BodyPart::COUNT], 0.8);
        let scaled = scale_poses(vec![pose], (100, 100), (200, 50));
        let nose = scaled[0].keypoint(BodyPart::Nose);
        assert_eq!((nose.x, nose.y, nose.score), (20.0, 10.0, 0.7));
        assert_eq!(scaled[0].score, 0.8);
    }
}
