use std::time::Duration;

use common::{
    checkpoint_table, new_run_id, resolve, Bindings, FlowError, InputRef, Instruction, Pipeline,
    Stage, StageDraft,
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::remote::RemoteServices;

const DEFAULT_STAGE_PACING_MS: u64 = 300;

/// Pausa fija entre etapas para no saturar al servicio de ejecución.
/// Se puede sobreescribir con la env var AUTOFLOW_STAGE_PACING_MS.
fn stage_pacing() -> Duration {
    let ms = std::env::var("AUTOFLOW_STAGE_PACING_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_STAGE_PACING_MS);
    Duration::from_millis(ms)
}

/// Resultado de un run completo.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    /// Tabla donde quedó la salida de la última etapa.
    pub final_table: String,
}

fn stage_failed(run_id: &str, sequence_number: u32, err: FlowError) -> FlowError {
    match err {
        FlowError::Collaborator { detail } => FlowError::StageFailed {
            run_id: run_id.to_string(),
            sequence_number,
            detail,
        },
        other => other,
    }
}

/// Ejecuta el pipeline completo, etapa por etapa en orden de secuencia,
/// contra el servicio de ejecución remoto:
///
/// 1. resuelve los bindings de la etapa (tokens del código, etapas
///    declaradas, fallback a los datasets declarados);
/// 2. ejecuta y guarda el resultado en el grafo de inmediato, para que
///    las etapas siguientes del mismo run resuelvan contra datos frescos;
/// 3. checkpointea el resultado en storage (`temp_<run>_step_<n>`, o
///    `final_<run>` para la última) antes de arrancar la siguiente etapa;
/// 4. espera la pausa fija entre etapas.
///
/// Estrictamente secuencial: la etapa n+1 nunca arranca antes de emitir
/// la escritura del checkpoint de la etapa n. Cualquier falla aborta el
/// resto del run identificando la etapa; los checkpoints previos quedan
/// en storage. No hay cancelación a mitad de run.
///
/// Toma `&mut Pipeline` durante todo el run: mientras dura, nadie más
/// puede editar el grafo.
pub async fn run_pipeline(
    remote: &RemoteServices,
    pipeline: &mut Pipeline,
) -> Result<RunOutcome, FlowError> {
    if pipeline.datasets.is_empty() {
        return Err(FlowError::UserInput("no hay datasets cargados".to_string()));
    }
    if pipeline.graph.is_empty() {
        return Err(FlowError::UserInput("no hay etapas para ejecutar".to_string()));
    }

    let run_id = new_run_id();
    let total = pipeline.graph.len();
    let pacing = stage_pacing();
    info!("iniciando run {} con {} etapas", run_id, total);

    let mut final_table = String::new();

    for idx in 0..total {
        let (stage_id, sequence_number, code, resolution) = {
            let stage = &pipeline.graph.stages()[idx];
            let resolution = resolve(stage, &pipeline.datasets, pipeline.graph.stages());
            (
                stage.id.clone(),
                stage.sequence_number,
                stage.generated_code.clone(),
                resolution,
            )
        };

        if resolution.used_fallback {
            // heredado: puede pasar datos de más si los input_refs quedaron
            // desactualizados respecto del código generado
            warn!(
                "etapa {}: el código no referencia ningún dataset conocido; \
                 usando los datasets declarados en input_refs",
                sequence_number
            );
        }

        info!(
            "ejecutando etapa {}/{} (seq={}, bindings={})",
            idx + 1,
            total,
            sequence_number,
            resolution.bindings.len()
        );

        let result = remote
            .execute(&resolution.bindings, &code)
            .await
            .map_err(|e| stage_failed(&run_id, sequence_number, e))?;

        pipeline.graph.set_result_rows(&stage_id, result.clone());

        let is_final = idx + 1 == total;
        let table = checkpoint_table(&run_id, sequence_number, is_final);
        remote
            .save_table(&table, &result)
            .await
            .map_err(|e| stage_failed(&run_id, sequence_number, e))?;
        info!("checkpoint '{}' guardado ({} filas)", table, result.len());

        if is_final {
            final_table = table;
        } else {
            sleep(pacing).await;
        }
    }

    info!("run {} completado; salida en '{}'", run_id, final_table);
    Ok(RunOutcome {
        run_id,
        final_table,
    })
}

/// Bindings para el round-trip de generación: exactamente los inputs que
/// el usuario seleccionó (datasets por nombre de variable, etapas como
/// df_step_<secuencia>).
fn selection_bindings(
    pipeline: &Pipeline,
    input_refs: &[InputRef],
) -> Result<Bindings, FlowError> {
    if input_refs.is_empty() {
        return Err(FlowError::UserInput(
            "no hay inputs seleccionados".to_string(),
        ));
    }

    let mut bindings = Bindings::new();
    for input in input_refs {
        match input {
            InputRef::Dataset(id) => {
                if let Some(ds) = pipeline.datasets.get(id) {
                    bindings.insert(ds.variable_name.clone(), ds.rows.clone());
                }
            }
            InputRef::Stage(id) => {
                if let Some(stage) = pipeline.graph.get(id) {
                    bindings.insert(
                        format!("df_step_{}", stage.sequence_number),
                        stage.result_rows.clone(),
                    );
                }
            }
        }
    }

    Ok(bindings)
}

async fn generation_round_trip(
    remote: &RemoteServices,
    pipeline: &Pipeline,
    input_refs: &[InputRef],
    instruction: &Instruction,
) -> Result<StageDraft, FlowError> {
    if instruction.text().trim().is_empty() {
        return Err(FlowError::UserInput(
            "falta el texto de la instrucción".to_string(),
        ));
    }

    let bindings = selection_bindings(pipeline, input_refs)?;
    let generated = remote
        .generate(&bindings, instruction.text(), instruction.task_type())
        .await?;

    Ok(StageDraft {
        input_refs: input_refs.to_vec(),
        instruction: instruction.clone(),
        generated_code: generated.code,
        result_rows: generated.result,
    })
}

/// Crea una etapa nueva vía el servicio de generación y la agrega al final
/// del grafo con el siguiente número de secuencia.
pub async fn create_stage(
    remote: &RemoteServices,
    pipeline: &mut Pipeline,
    input_refs: Vec<InputRef>,
    instruction: Instruction,
) -> Result<Stage, FlowError> {
    let draft = generation_round_trip(remote, pipeline, &input_refs, &instruction).await?;
    let stage = pipeline.graph.append(draft).clone();
    info!(
        "etapa {} creada (seq={})",
        stage.id, stage.sequence_number
    );
    Ok(stage)
}

/// Reconfigura una etapa existente: mismo round-trip de generación, pero
/// la etapa conserva su `id` y su posición en el pipeline.
pub async fn rework_stage(
    remote: &RemoteServices,
    pipeline: &mut Pipeline,
    stage_id: &str,
    input_refs: Vec<InputRef>,
    instruction: Instruction,
) -> Result<Stage, FlowError> {
    if pipeline.graph.get(stage_id).is_none() {
        return Err(FlowError::UserInput(format!(
            "no existe la etapa {}",
            stage_id
        )));
    }

    let draft = generation_round_trip(remote, pipeline, &input_refs, &instruction).await?;
    let stage = pipeline.graph.replace(stage_id, draft)?.clone();
    info!(
        "etapa {} reconfigurada (seq={})",
        stage.id, stage.sequence_number
    );
    Ok(stage)
}
