use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FpsError {
    /// Raised when frames arrive around a mode switch, before `start` or after `stop`.
    #[error("initial time uninitialized; start() has not been called")]
    NotStarted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FpsInfo {
    pub elapsed_secs: f64,
    pub frames_read: u64,
    pub fps: f64,
}

/// Counts frames rendered while a mode is active.
#[derive(Debug, Default)]
pub struct FpsAnalyzer {
    started: Option<Instant>,
    info: FpsInfo,
}

impl FpsAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.info = FpsInfo::default();
        // The first frame is counted at start.
        let _ = self.update(now);
    }

    pub fn update(&mut self, now: Instant) -> Result<(), FpsError> {
        let started = self.started.ok_or(FpsError::NotStarted)?;
        self.info.frames_read += 1;
        self.info.elapsed_secs = now.saturating_duration_since(started).as_secs_f64();
        self.info.fps = if self.info.elapsed_secs == 0.0 {
            0.0
        } else {
            self.info.frames_read as f64 / self.info.elapsed_secs
        };
        Ok(())
    }

    pub fn stop(&mut self) -> Result<FpsInfo, FpsError> {
        self.started.take().ok_or(FpsError::NotStarted)?;
        Ok(self.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn update_before_start_is_reported() {
        let mut fps = FpsAnalyzer::new();
        assert_eq!(fps.update(Instant::now()), Err(FpsError::NotStarted));
        assert_eq!(fps.stop(), Err(FpsError::NotStarted));
    }

    #[test]
    fn counts_frames_over_elapsed_time() {
        let mut fps = FpsAnalyzer::new();
        let t0 = Instant::now();
        fps.start(t0);
        for i in 1..=19 {
            fps.update(t0 + Duration::from_millis(50 * i)).unwrap();
        }
        let info = fps.stop().unwrap();
        assert_eq!(info.frames_read, 20);
        assert!((info.fps - 20.0 / 0.95).abs() < 1e-6);
        assert_eq!(fps.update(t0), Err(FpsError::NotStarted));
    }
}
