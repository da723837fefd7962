use thiserror::Error;

/// Errores del motor de workflows. Ninguno es fatal para el proceso:
/// cada falla queda acotada a la operación que la disparó y el pipeline
/// en memoria conserva su último estado bueno.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Entrada de usuario inválida. Se rechaza antes de llamar a cualquier
    /// servicio remoto.
    #[error("entrada inválida: {0}")]
    UserInput(String),

    /// Un servicio colaborador (generación, ejecución, storage, schedules)
    /// falló o devolvió un payload de error.
    #[error("servicio colaborador falló: {detail}")]
    Collaborator { detail: String },

    /// Una etapa falló a mitad de un run. El resto del run se aborta;
    /// los checkpoints ya escritos quedan en storage (sin rollback).
    #[error("run {run_id} falló en la etapa {sequence_number}: {detail}")]
    StageFailed {
        run_id: String,
        sequence_number: u32,
        detail: String,
    },
}
