//! Sync jobs and the runner that executes them as isolated tasks.

mod pull;
mod push;
mod runner;

pub use pull::PullJob;
pub use push::{PushJob, PushRequest};
pub use runner::{run_pull, run_push, spawn_pull, spawn_push, JobContext, JobHandle};
