use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::Result;
use crossbeam_channel::Sender;

use crate::types::Frame;

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Expands packed RGB into the RGBA layout the rest of the pipeline uses.
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }
    rgba
}

#[cfg(feature = "camera-nokhwa")]
mod backend {
    use std::time::Instant;

    use anyhow::Result;
    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    };

    use crate::types::Frame;

    pub struct Capture {
        camera: Camera,
    }

    impl Capture {
        pub fn open(index: u32) -> Result<Self> {
            let requested = RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::AbsoluteHighestFrameRate,
            );
            let mut camera = Camera::new(CameraIndex::Index(index), requested)?;
            camera.open_stream()?;
            log::info!(
                "camera {index} opened: {} at {}",
                camera.info().human_name(),
                camera.camera_format()
            );
            Ok(Self { camera })
        }

        pub fn next_frame(&mut self) -> Result<Option<Frame>> {
            let buffer = self.camera.frame()?;
            let decoded = buffer.decode_image::<RgbFormat>()?;
            let (width, height) = decoded.dimensions();
            let rgb = decoded.into_raw();
            if rgb.is_empty() {
                return Ok(None);
            }
            Ok(Some(Frame {
                rgba: super::rgb_to_rgba(&rgb),
                width,
                height,
                timestamp: Instant::now(),
            }))
        }
    }
}

#[cfg(not(feature = "camera-nokhwa"))]
mod backend {
    use anyhow::{Result, bail};

    use crate::types::Frame;

    pub struct Capture;

    impl Capture {
        pub fn open(index: u32) -> Result<Self> {
            bail!("camera {index} unavailable: built without the camera-nokhwa feature")
        }

        pub fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(None)
        }
    }
}

/// Opens the camera and forwards frames on a capture thread. Frames are dropped while the
/// consumer is busy.
pub fn start_camera_stream(index: u32, frame_tx: Sender<Frame>) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    drop(backend::Capture::open(index)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut capture = match backend::Capture::open(index) {
            Ok(capture) => capture,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            match capture.next_frame() {
                Ok(Some(frame)) => {
                    let _ = frame_tx.try_send(frame);
                }
                Ok(None) => {}
                Err(err) => log::warn!("camera frame read failed: {err:?}"),
            }
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_gains_opaque_alpha() {
        assert_eq!(
            rgb_to_rgba(&[1, 2, 3, 4, 5, 6]),
            vec![1, 2, 3, 255, 4, 5, 6, 255]
        );
    }
}
