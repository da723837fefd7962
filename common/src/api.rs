use serde::{Deserialize, Serialize};

use crate::dataset::Records;
use crate::resolver::Bindings;
use crate::workflow::StageSpec;

/* --------- Servicio de generación --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Bindings nombre → filas que el código generado podrá referenciar.
    pub datasets: Bindings,
    pub prompt: String,
    pub task_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub code: String,
    #[serde(default)]
    pub result: Records,
}

/* --------- Servicio de ejecución --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub datasets: Bindings,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub result: Records,
}

/* --------- Servicio de storage tabular --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTableRequest {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTableResponse {
    pub name: String,
    #[serde(default)]
    pub data: Records,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTableRequest {
    pub table_name: String,
    pub data: Records,
    pub if_exists: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTableResponse {
    pub message: String,
    pub rows: u64,
}

/* --------- Workflow store --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSaveRequest {
    pub name: String,
    pub steps: Vec<StageSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSaveResponse {
    pub message: String,
    pub id: String,
}

/* --------- Servicio de schedules --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub workflow_id: String,
    /// "interval" (minutos) o "daily" (hora HH:MM)
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCreateResponse {
    pub message: String,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub id: String,
    pub next_run: String,
    pub workflow_id: String,
    pub trigger: String,
}

/* --------- Payload de error de los colaboradores --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
