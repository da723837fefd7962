use std::collections::HashMap;

use serde::Serialize;

use crate::dataset::DatasetRegistry;
use crate::resolver::Edge;
use crate::stage::Stage;

/// Caja fija por nodo (la configuración del canvas original) y separaciones
/// uniformes entre columnas y rangos.
pub const NODE_WIDTH: f64 = 250.0;
pub const NODE_HEIGHT: f64 = 100.0;
const NODE_SEP: f64 = 50.0;
const RANK_SEP: f64 = 50.0;

/// Nodo posicionado del layout jerárquico top-to-bottom. Las coordenadas
/// son sólo para dibujar; el orden de ejecución lo gobierna únicamente
/// `sequence_number`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub rank: u32,
    pub x: f64,
    pub y: f64,
}

/// Layout en capas de (datasets, etapas, aristas):
///
/// 1. rango = camino más largo desde una fuente (datasets y etapas sin
///    dependencias resueltas quedan en el rango 0);
/// 2. orden horizontal dentro del rango por baricentro de predecesores
///    (reduce cruces), con desempate estable por orden de inserción;
/// 3. coordenadas de pantalla sobre una grilla uniforme.
///
/// Función pura y determinista: correrla dos veces sobre el mismo grafo da
/// exactamente el mismo resultado. Tolera componentes desconectados.
pub fn layout(datasets: &DatasetRegistry, stages: &[Stage], edges: &[Edge]) -> Vec<PositionedNode> {
    // nodos en orden de inserción: datasets primero, luego etapas
    let mut ids: Vec<&str> = Vec::new();
    let mut labels: Vec<String> = Vec::new();

    for ds in datasets.iter() {
        ids.push(&ds.id);
        labels.push(ds.name.clone());
    }
    for stage in stages {
        ids.push(&stage.id);
        labels.push(format!("Stage {}", stage.sequence_number));
    }

    let index_of: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    // predecesores por nodo (se ignoran aristas hacia nodos desconocidos,
    // p.ej. un dataset ya removido)
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for edge in edges {
        if let (Some(&src), Some(&dst)) = (
            index_of.get(edge.source.as_str()),
            index_of.get(edge.target.as_str()),
        ) {
            preds[dst].push(src);
        }
    }

    // 1) rango por camino más largo. Las aristas siempre van de artefactos
    //    creados antes hacia etapas creadas después, así que el orden de
    //    inserción ya es topológico y alcanza una sola pasada.
    let mut rank: Vec<u32> = vec![0; ids.len()];
    for i in 0..ids.len() {
        rank[i] = preds[i]
            .iter()
            .map(|&p| rank[p] + 1)
            .max()
            .unwrap_or(0);
    }

    // 2) orden dentro de cada rango por baricentro de predecesores
    let max_rank = rank.iter().copied().max().unwrap_or(0);
    let mut column: Vec<usize> = vec![0; ids.len()];

    for r in 0..=max_rank {
        let members: Vec<usize> = (0..ids.len()).filter(|&i| rank[i] == r).collect();

        // baricentro: promedio de columnas de los predecesores; sin
        // predecesores, la posición de inserción dentro del rango
        let mut keyed: Vec<(usize, f64)> = members
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let bary = if preds[i].is_empty() {
                    pos as f64
                } else {
                    let sum: f64 = preds[i].iter().map(|&p| column[p] as f64).sum();
                    sum / preds[i].len() as f64
                };
                (i, bary)
            })
            .collect();

        // sort estable: los empates conservan el orden de inserción
        keyed.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (col, (i, _)) in keyed.into_iter().enumerate() {
            column[i] = col;
        }
    }

    // 3) coordenadas
    (0..ids.len())
        .map(|i| PositionedNode {
            id: ids[i].to_string(),
            label: labels[i].clone(),
            rank: rank[i],
            x: column[i] as f64 * (NODE_WIDTH + NODE_SEP),
            y: rank[i] as f64 * (NODE_HEIGHT + RANK_SEP),
        })
        .collect()
}
