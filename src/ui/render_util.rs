use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba, RgbaImage};

pub(super) fn to_render_image(image: &RgbaImage) -> Option<Arc<RenderImage>> {
    let (width, height) = image.dimensions();
    let bgra = rgba_to_bgra(image.as_raw().clone());
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, bgra)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

// GPUI expects BGRA; converting here avoids the async asset pipeline and its flicker.
fn rgba_to_bgra(mut pixels: Vec<u8>) -> Vec<u8> {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    pixels
}
