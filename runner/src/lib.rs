pub mod bridge;
pub mod orchestrator;
pub mod remote;

pub use bridge::{load_workflow, reconstruct_historical, save_workflow};
pub use orchestrator::{create_stage, rework_stage, run_pipeline, RunOutcome};
pub use remote::RemoteServices;
