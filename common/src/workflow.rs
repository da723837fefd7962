use serde::{Deserialize, Serialize};

use crate::stage::{InputRef, Instruction, Stage, StageId};

/// Descriptor de etapa dentro de un workflow guardado: estructura y código
/// generado, sin datos materializados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub id: StageId,
    pub sequence_number: u32,
    pub input_refs: Vec<InputRef>,
    pub instruction: Instruction,
    pub generated_code: String,
}

impl StageSpec {
    pub fn from_stage(stage: &Stage) -> Self {
        Self {
            id: stage.id.clone(),
            sequence_number: stage.sequence_number,
            input_refs: stage.input_refs.clone(),
            instruction: stage.instruction.clone(),
            generated_code: stage.generated_code.clone(),
        }
    }

    /// Rehidrata la etapa con resultado vacío: los datos materializados
    /// quedan intencionalmente ausentes hasta ejecutar (o reconstruir).
    pub fn into_stage(self) -> Stage {
        Stage {
            id: self.id,
            sequence_number: self.sequence_number,
            input_refs: self.input_refs,
            instruction: self.instruction,
            generated_code: self.generated_code,
            result_rows: Vec::new(),
        }
    }
}

/// Snapshot nombrado y persistible de la estructura de un pipeline.
/// Es dueño del formato el workflow store; acá sólo se traduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub steps: Vec<StageSpec>,
}

/// Etapas → descriptores para guardar (descarta `result_rows`).
pub fn strip_stages(stages: &[Stage]) -> Vec<StageSpec> {
    stages.iter().map(StageSpec::from_stage).collect()
}

/// Descriptores guardados → etapas listas para re-ejecutar.
pub fn hydrate_stages(steps: Vec<StageSpec>) -> Vec<Stage> {
    steps.into_iter().map(StageSpec::into_stage).collect()
}
