use std::collections::{BTreeMap, HashSet};

use crate::dataset::{DatasetRegistry, Records};
use crate::stage::{InputRef, Stage, StageId};

/// Mapa nombre de binding → filas, tal como se manda al servicio de
/// ejecución. BTreeMap para que el payload y los tests sean deterministas.
pub type Bindings = BTreeMap<String, Records>;

/// Arista derivada `source → target`. Se recalcula en cada cambio
/// estructural; nunca se persiste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: StageId,
}

/// Resultado de resolver las dependencias de una etapa.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub bindings: Bindings,
    /// true si no hubo coincidencias de tokens y se usaron los datasets
    /// declarados en `input_refs` como fallback.
    pub used_fallback: bool,
}

/// Tokens identificador del código generado: corridas de `[A-Za-z0-9_]`.
/// Coincidencia exacta contra nombres de variable, no por substring, para
/// que `df_order` nunca matchee dentro de `df_orders`.
fn identifier_tokens(code: &str) -> HashSet<&str> {
    code.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Calcula el conjunto mínimo de artefactos upstream que una etapa
/// necesita para ejecutarse:
///
/// (a) cada dataset cuyo `variable_name` aparece como token exacto en el
///     código generado se vincula bajo ese nombre;
/// (b) cada etapa anterior declarada en `input_refs` se vincula
///     incondicionalmente como `df_step_<secuencia>` (los links
///     etapa→etapa son por selección explícita, no se infieren del texto).
///
/// Fallback: si (a) no vinculó ningún dataset, se vinculan directamente
/// todos los datasets declarados en `input_refs`. Cubre código generado
/// que no repite literalmente los nombres ofrecidos; puede pasar datos de
/// más si los `input_refs` quedaron desactualizados respecto del código
/// (comportamiento heredado, documentado; el orquestador lo loguea).
pub fn resolve(stage: &Stage, datasets: &DatasetRegistry, stages: &[Stage]) -> Resolution {
    let tokens = identifier_tokens(&stage.generated_code);
    let mut bindings = Bindings::new();

    // (a) datasets por token exacto en el código
    for ds in datasets.iter() {
        if tokens.contains(ds.variable_name.as_str()) {
            bindings.insert(ds.variable_name.clone(), ds.rows.clone());
        }
    }
    let dataset_matches = bindings.len();

    // (b) etapas anteriores declaradas explícitamente
    for input in &stage.input_refs {
        if let InputRef::Stage(id) = input {
            let prev = stages
                .iter()
                .find(|s| s.id == *id && s.sequence_number < stage.sequence_number);
            if let Some(prev) = prev {
                bindings.insert(
                    format!("df_step_{}", prev.sequence_number),
                    prev.result_rows.clone(),
                );
            }
        }
    }

    // fallback: sin matches de datasets, usar los declarados
    let mut used_fallback = false;
    if dataset_matches == 0 {
        for input in &stage.input_refs {
            if let InputRef::Dataset(id) = input {
                if let Some(ds) = datasets.get(id) {
                    bindings.insert(ds.variable_name.clone(), ds.rows.clone());
                    used_fallback = true;
                }
            }
        }
    }

    Resolution {
        bindings,
        used_fallback,
    }
}

/// Lista de aristas para el layout: función pura de (datasets, etapas),
/// recalculada bajo demanda para evitar bugs de invalidación.
pub fn edges(datasets: &DatasetRegistry, stages: &[Stage]) -> Vec<Edge> {
    let mut out = Vec::new();

    for stage in stages {
        let tokens = identifier_tokens(&stage.generated_code);

        for ds in datasets.iter() {
            if tokens.contains(ds.variable_name.as_str()) {
                out.push(Edge {
                    source: ds.id.clone(),
                    target: stage.id.clone(),
                });
            }
        }

        for input in &stage.input_refs {
            if let InputRef::Stage(id) = input {
                let is_earlier = stages
                    .iter()
                    .any(|s| s.id == *id && s.sequence_number < stage.sequence_number);
                if is_earlier {
                    out.push(Edge {
                        source: id.clone(),
                        target: stage.id.clone(),
                    });
                }
            }
        }
    }

    out
}
