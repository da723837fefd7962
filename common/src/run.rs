use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identificador de run: timestamp UTC colapsado a dígitos, granularidad
/// de segundos. Estable frente a zona horaria. Re-ejecutar siempre genera
/// un run nuevo; no hay reanudación parcial.
pub fn new_run_id() -> String {
    format!("run_{}", Utc::now().format("%Y%m%d%H%M%S"))
}

/// Nombre de checkpoint que escribe el orquestador durante un run
/// interactivo: `final_<run>` para la última etapa,
/// `temp_<run>_step_<secuencia>` para las intermedias.
pub fn checkpoint_table(run_id: &str, sequence_number: u32, is_final: bool) -> String {
    if is_final {
        format!("final_{}", run_id)
    } else {
        format!("temp_{}_step_{}", run_id, sequence_number)
    }
}

/// Nombre de tabla que escribe el runner agendado (servicio externo) y que
/// lee la reconstrucción histórica: `<run>_final` para la última etapa,
/// `<run>_step_<secuencia>` para las intermedias.
pub fn history_table(run_id: &str, sequence_number: u32, is_final: bool) -> String {
    if is_final {
        format!("{}_final", run_id)
    } else {
        format!("{}_step_{}", run_id, sequence_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Registro de ejecución de un workflow agendado, tal como lo devuelve el
/// servicio de schedules. El núcleo sólo lo consume (historial e
/// inspección); nunca lo escribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub output_table: Option<String>,
    pub error_msg: Option<String>,
}
