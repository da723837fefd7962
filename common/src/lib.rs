pub mod api;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod resolver;
pub mod run;
pub mod stage;
pub mod workflow;

// Re-exports para tener una API limpia desde fuera del crate
pub use api::{
    ErrorDetail, ExecuteRequest, ExecuteResponse, GenerateRequest, GenerateResponse,
    LoadTableRequest, LoadTableResponse, SaveTableRequest, SaveTableResponse,
    ScheduleCreateResponse, ScheduleInfo, ScheduleRequest, TablesResponse,
    WorkflowSaveRequest, WorkflowSaveResponse,
};
pub use dataset::{Dataset, DatasetId, DatasetKind, DatasetRegistry, Record, Records};
pub use error::FlowError;
pub use layout::{layout, PositionedNode};
pub use resolver::{edges, resolve, Bindings, Edge, Resolution};
pub use run::{checkpoint_table, history_table, new_run_id, RunRecord, RunStatus};
pub use stage::{InputRef, Instruction, Pipeline, Stage, StageDraft, StageGraph, StageId};
pub use workflow::{StageSpec, WorkflowDefinition};
