use common::{history_table, workflow, FlowError, RunRecord, Stage, WorkflowDefinition};
use tracing::{info, warn};

use crate::remote::RemoteServices;

/// Guarda el pipeline como workflow nombrado: estructura y código
/// generado, sin datos materializados. Devuelve el id asignado por el
/// workflow store.
pub async fn save_workflow(
    remote: &RemoteServices,
    name: &str,
    stages: &[Stage],
) -> Result<String, FlowError> {
    if stages.is_empty() {
        return Err(FlowError::UserInput(
            "no hay etapas para guardar".to_string(),
        ));
    }

    let steps = workflow::strip_stages(stages);
    let id = remote.save_workflow(name, steps).await?;
    info!("workflow '{}' guardado con id {}", name, id);
    Ok(id)
}

/// Carga un workflow guardado y devuelve su definición más el esqueleto de
/// etapas con resultados vacíos, listo para re-ejecutar.
pub async fn load_workflow(
    remote: &RemoteServices,
    workflow_id: &str,
) -> Result<(WorkflowDefinition, Vec<Stage>), FlowError> {
    let definitions = remote.list_workflows().await?;
    let definition = definitions
        .into_iter()
        .find(|w| w.id == workflow_id)
        .ok_or_else(|| FlowError::UserInput(format!("no existe el workflow {}", workflow_id)))?;

    let stages = workflow::hydrate_stages(definition.steps.clone());
    Ok((definition, stages))
}

/// Reconstruye el estado de un run histórico: por cada etapa de la
/// definición deriva el nombre de su tabla de checkpoint
/// (`<run>_step_<n>`, `<run>_final` para la última) y la trae de storage.
///
/// Mejor esfuerzo: un checkpoint faltante o infetcheable deja esa etapa
/// con resultado vacío y sigue con las demás; nunca aborta la
/// reconstrucción completa.
pub async fn reconstruct_historical(
    remote: &RemoteServices,
    run: &RunRecord,
    definition: &WorkflowDefinition,
) -> Vec<Stage> {
    let total = definition.steps.len();
    let mut stages = Vec::with_capacity(total);

    for (idx, step) in definition.steps.iter().enumerate() {
        let is_final = idx + 1 == total;
        let table = history_table(&run.id, step.sequence_number, is_final);

        let rows = match remote.load_table(&table).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "checkpoint '{}' no disponible ({}); la etapa {} queda vacía",
                    table, err, step.sequence_number
                );
                Vec::new()
            }
        };

        let mut stage = step.clone().into_stage();
        stage.result_rows = rows;
        stages.push(stage);
    }

    stages
}
