mod config;
mod motion;
mod state;

pub use config::MotionConfig;
pub use motion::{Landing, MotionSimulator};
pub use state::{EliminationCause, RunnerState, WORLD_UNITS_PER_METER};
