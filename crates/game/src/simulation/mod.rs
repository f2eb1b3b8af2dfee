mod local;
mod step;
mod tick;

pub use local::{FrameReport, LocalRun, MAX_FRAME_TIME_FACTOR};
pub use step::{Elimination, RunnerStep, StepReport, advance_runner, step_session};
pub use tick::{FixedTimestep, TickScheduler, TickStats};
