use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

/// Output surface the composed frames are drawn onto.
pub const DISPLAY_WIDTH: u32 = 1920;
pub const DISPLAY_HEIGHT: u32 = 1080;

/// Snapshots are downscaled to this size before being sent to the effect service.
pub const SNAPSHOT_WIDTH: u32 = 960;
pub const SNAPSHOT_HEIGHT: u32 = 540;

/// Time between automatic switches of the costume and wireframe overlays.
pub const MODE_SWITCH_DELAY: Duration = Duration::from_millis(10_000);

pub const DEFAULT_HOLD: Duration = Duration::from_millis(4_000);
pub const DEFAULT_GRACE: Duration = Duration::from_millis(1_500);
pub const DEFAULT_VISIBLE_BELOW: Duration = Duration::from_millis(3_000);
pub const MAX_CLOCK_STEP: Duration = Duration::from_secs(1);

pub const SNAPSHOT_COUNTDOWN: Duration = Duration::from_secs(5);
pub const RESULT_DISPLAY: Duration = Duration::from_secs(5);

pub const MENU_OPTION_COUNT: usize = 4;

pub const MIN_POSE_CONFIDENCE: f32 = 0.15;
pub const MIN_PART_CONFIDENCE: f32 = 0.1;

const DEFAULT_MAGICK_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_POSE_MODEL_DIR: &str = "models";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("could not parse {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("unknown pose model {0:?}")]
    UnknownModel(String),
    #[error("hold duration {hold:?} must be shorter than the mode switch delay {switch:?}")]
    HoldExceedsSwitchDelay { hold: Duration, switch: Duration },
    #[error("countdown visibility threshold {visible:?} exceeds hold duration {hold:?}")]
    VisibleExceedsHold { visible: Duration, hold: Duration },
    #[error("reset grace window must be positive")]
    ZeroGrace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoseModelKind {
    MoveNetMultipose,
    MoveNetSinglepose,
}

impl PoseModelKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movenet" | "movenet-multi" | "multipose" => Ok(PoseModelKind::MoveNetMultipose),
            "movenet-single" | "singlepose" => Ok(PoseModelKind::MoveNetSinglepose),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PoseModelKind::MoveNetMultipose => "MoveNet multipose lightning",
            PoseModelKind::MoveNetSinglepose => "MoveNet singlepose lightning",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            PoseModelKind::MoveNetMultipose => "movenet_multipose_lightning.onnx",
            PoseModelKind::MoveNetSinglepose => "movenet_singlepose_lightning.onnx",
        }
    }
}

/// Timings of the gesture clock. Constructing one checks that a held gesture can finish
/// before the overlays switch underneath it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    pub hold: Duration,
    pub grace: Duration,
    pub visible_below: Duration,
    pub max_step: Duration,
}

impl ClockConfig {
    pub fn new(
        hold: Duration,
        grace: Duration,
        visible_below: Duration,
        switch_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if hold >= switch_delay {
            return Err(ConfigError::HoldExceedsSwitchDelay {
                hold,
                switch: switch_delay,
            });
        }
        if visible_below > hold {
            return Err(ConfigError::VisibleExceedsHold {
                visible: visible_below,
                hold,
            });
        }
        if grace.is_zero() {
            return Err(ConfigError::ZeroGrace);
        }
        Ok(Self {
            hold,
            grace,
            visible_below,
            max_step: MAX_CLOCK_STEP,
        })
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            hold: DEFAULT_HOLD,
            grace: DEFAULT_GRACE,
            visible_below: DEFAULT_VISIBLE_BELOW,
            max_step: MAX_CLOCK_STEP,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pose_model: PoseModelKind,
    pub pose_model_path: PathBuf,
    pub pose_model_url: Option<String>,
    pub magick_enabled: bool,
    pub magick_url: String,
    pub head_image: Option<PathBuf>,
    pub camera_index: u32,
    pub clock: ClockConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Invalid values are logged and replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pose_model = match lookup("TOBY_POSE_MODEL") {
            Some(value) => PoseModelKind::parse(&value).unwrap_or_else(|err| {
                log::error!("{err}; defaulting to MoveNet");
                PoseModelKind::MoveNetMultipose
            }),
            None => PoseModelKind::MoveNetMultipose,
        };

        let pose_model_path = lookup("TOBY_POSE_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_POSE_MODEL_DIR).join(pose_model.file_name()));

        let magick_enabled = match lookup("TOBY_MAGICK_ENABLED") {
            Some(value) => parse_flag(&value).unwrap_or_else(|err| {
                log::error!("{err}; ImageMagick menu disabled");
                false
            }),
            None => false,
        };

        let camera_index = match lookup("TOBY_CAMERA_INDEX") {
            Some(value) => value.trim().parse::<u32>().unwrap_or_else(|_| {
                log::error!(
                    "{}; using camera 0",
                    ConfigError::InvalidValue {
                        name: "TOBY_CAMERA_INDEX",
                        value,
                    }
                );
                0
            }),
            None => 0,
        };

        let clock = ClockConfig::new(
            DEFAULT_HOLD,
            DEFAULT_GRACE,
            DEFAULT_VISIBLE_BELOW,
            MODE_SWITCH_DELAY,
        )
        .unwrap_or_else(|err| {
            log::error!("invalid gesture clock timings: {err}; using defaults");
            ClockConfig::default()
        });

        Self {
            pose_model,
            pose_model_path,
            pose_model_url: lookup("TOBY_POSE_MODEL_URL").filter(|url| !url.is_empty()),
            magick_enabled,
            magick_url: lookup("TOBY_MAGICK_URL").unwrap_or_else(|| DEFAULT_MAGICK_URL.to_string()),
            head_image: lookup("TOBY_HEAD_IMAGE").map(PathBuf::from),
            camera_index,
            clock,
        }
    }
}

/// Integer flag: anything above zero enables the feature.
fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map(|n| n > 0)
        .map_err(|_| ConfigError::InvalidValue {
            name: "TOBY_MAGICK_ENABLED",
            value: value.to_string(),
        })
}
