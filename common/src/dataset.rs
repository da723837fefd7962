use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type DatasetId = String;

/// Tipo genérico de registro (fila de datos).
/// Usamos JSON para poder representar cualquier tabla que venga del storage.
pub type Record = Value;

/// Colección en memoria de registros con forma homogénea.
pub type Records = Vec<Record>;

/// Origen de un dataset. Los datasets siempre son fuentes cargadas por el
/// usuario; las etapas nunca producen datasets nuevos, sólo `result_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetKind {
    Source,
}

/// Tabla fuente cargada en la sesión. Inmutable una vez cargada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    /// Nombre legible (nombre de tabla en storage).
    pub name: String,
    /// Identificador apto para código generado, derivado de `name`.
    /// El código generado referencia los datos bajo este nombre.
    pub variable_name: String,
    pub rows: Records,
    pub kind: DatasetKind,
}

/// Deriva el nombre de variable con el que el código generado referencia
/// al dataset: prefijo `df_` + el nombre con todo carácter no alfanumérico
/// reemplazado por `_`.
pub fn variable_name_for(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("df_{}", cleaned)
}

/// Registro de datasets fuente de la sesión.
///
/// Las colisiones de `variable_name` NO se deduplican: si el llamador carga
/// dos nombres que sanean igual, la inferencia de dependencias se vuelve
/// ambigua. Es responsabilidad del llamador usar nombres distintos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetRegistry {
    datasets: Vec<Dataset>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carga una tabla fuente y devuelve el dataset creado.
    pub fn load(&mut self, name: &str, rows: Records) -> &Dataset {
        let dataset = Dataset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            variable_name: variable_name_for(name),
            rows,
            kind: DatasetKind::Source,
        };

        let idx = self.datasets.len();
        self.datasets.push(dataset);
        &self.datasets[idx]
    }

    /// Quita un dataset. No borra en cascada las etapas que lo referencian;
    /// esas etapas simplemente pierden un input resoluble en la próxima
    /// ejecución.
    pub fn remove(&mut self, id: &str) -> Option<Dataset> {
        let idx = self.datasets.iter().position(|d| d.id == id)?;
        Some(self.datasets.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.iter()
    }

    pub fn as_slice(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn clear(&mut self) {
        self.datasets.clear();
    }
}
