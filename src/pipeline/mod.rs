pub mod camera;
pub mod compositor;
pub mod pose;
pub mod session;

pub use camera::{CameraStream, start_camera_stream};
pub use compositor::load_sprite;
pub use pose::{PoseEstimator, load_estimator};
pub use session::{SessionEvent, SessionHandle, start_session};
