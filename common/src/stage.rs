use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{DatasetId, DatasetRegistry, Records};
use crate::error::FlowError;

pub type StageId = String;

/// Referencia a un input seleccionado explícitamente por el usuario para
/// una etapa: un dataset fuente o la salida de una etapa anterior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum InputRef {
    Dataset(DatasetId),
    Stage(StageId),
}

/// Modo de la instrucción de una etapa: texto libre en lenguaje natural,
/// o un módulo plantillado con nombre y objetivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "mode")]
pub enum Instruction {
    General { text: String },
    Module { name: String, objective: String },
}

impl Instruction {
    /// Texto que se manda al servicio de generación.
    pub fn text(&self) -> &str {
        match self {
            Instruction::General { text } => text,
            Instruction::Module { objective, .. } => objective,
        }
    }

    /// Etiqueta de tipo de tarea para el servicio de generación.
    pub fn task_type(&self) -> &str {
        match self {
            Instruction::General { .. } => "GENERAL",
            Instruction::Module { name, .. } => name,
        }
    }
}

/// Una etapa de transformación del pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Posición 1-based según orden de creación. Densa por construcción;
    /// estable frente a ediciones in-place.
    pub sequence_number: u32,
    /// Inputs que el usuario seleccionó como intención. El código generado
    /// es la fuente autoritativa de las dependencias reales (ver resolver).
    pub input_refs: Vec<InputRef>,
    pub instruction: Instruction,
    pub generated_code: String,
    /// Salida materializada de la última ejecución exitosa; vacía hasta
    /// el primer run.
    #[serde(default)]
    pub result_rows: Records,
}

/// Campos de una etapa nueva o reconfigurada; el grafo asigna id y posición.
#[derive(Debug, Clone)]
pub struct StageDraft {
    pub input_refs: Vec<InputRef>,
    pub instruction: Instruction,
    pub generated_code: String,
    pub result_rows: Records,
}

/// Colección ordenada de etapas. Ninguna operación renumera etapas
/// existentes; la secuencia es densa y estrictamente creciente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageGraph {
    stages: Vec<Stage>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruye un grafo desde etapas ya numeradas (carga de un
    /// workflow guardado o reconstrucción histórica).
    pub fn hydrate(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Inserta al final con el siguiente número de secuencia.
    pub fn append(&mut self, draft: StageDraft) -> &Stage {
        let stage = Stage {
            id: Uuid::new_v4().to_string(),
            sequence_number: self.stages.len() as u32 + 1,
            input_refs: draft.input_refs,
            instruction: draft.instruction,
            generated_code: draft.generated_code,
            result_rows: draft.result_rows,
        };

        let idx = self.stages.len();
        self.stages.push(stage);
        &self.stages[idx]
    }

    /// Edición in-place: mismo `id`, mismo `sequence_number`; se reemplazan
    /// inputs, instrucción, código y resultado.
    pub fn replace(&mut self, id: &str, draft: StageDraft) -> Result<&Stage, FlowError> {
        let idx = self
            .stages
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| FlowError::UserInput(format!("no existe la etapa {}", id)))?;

        let stage = &mut self.stages[idx];
        stage.input_refs = draft.input_refs;
        stage.instruction = draft.instruction;
        stage.generated_code = draft.generated_code;
        stage.result_rows = draft.result_rows;

        Ok(&self.stages[idx])
    }

    /// Guarda el resultado materializado de una etapa. Lo usa el
    /// orquestador apenas el servicio de ejecución responde, para que las
    /// etapas siguientes del mismo run resuelvan contra datos frescos.
    pub fn set_result_rows(&mut self, id: &str, rows: Records) -> bool {
        match self.stages.iter_mut().find(|s| s.id == id) {
            Some(stage) => {
                stage.result_rows = rows;
                true
            }
            None => false,
        }
    }

    /// Borra todas las etapas. La confirmación ("¿borrar progreso?") es
    /// asunto del cliente, no del núcleo.
    pub fn reset(&mut self) {
        self.stages.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Agregado único de estado de la sesión: datasets fuente + grafo de etapas.
/// El orquestador toma `&mut Pipeline` durante todo un run, así que el
/// borrow checker garantiza que ejecución y edición nunca se solapan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub datasets: DatasetRegistry,
    pub graph: StageGraph,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// "Proyecto nuevo": limpia datasets y etapas.
    pub fn reset(&mut self) {
        self.datasets.clear();
        self.graph.reset();
    }
}
