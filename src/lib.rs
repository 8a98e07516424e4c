pub mod camera;
pub mod config;
pub mod error;
pub mod garment;
pub mod logging;
pub mod overlay;
pub mod pose;
pub mod render;
pub mod session;

pub use config::Config;
pub use error::{TryOnError, TryOnResult};
pub use session::{FrameScheduler, TickOutcome, TryOnSession};
