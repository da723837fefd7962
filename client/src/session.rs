use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common::Pipeline;
use serde::{Deserialize, Serialize};

/// Dónde persiste la sesión entre invocaciones de la CLI.
/// Se puede mover con AUTOFLOW_SESSION.
pub fn session_path() -> PathBuf {
    std::env::var("AUTOFLOW_SESSION")
        .unwrap_or_else(|_| ".autoflow_session.json".to_string())
        .into()
}

/// Estado de trabajo del usuario: el pipeline en curso más el contexto de
/// qué workflow está abierto y si se está mirando un run histórico.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub pipeline: Pipeline,
    /// Workflow guardado del que salió este pipeline, si hay uno abierto.
    pub workflow_id: Option<String>,
    /// Si está seteado, las etapas muestran los datos de ese run histórico
    /// y la sesión es de solo lectura hasta volver al pipeline vivo.
    pub historical_run_id: Option<String>,
}

impl Session {
    pub fn load() -> Result<Self> {
        let path = session_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("no se pudo leer la sesión en {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("sesión corrupta en {}", path.display()))
    }

    pub fn store(&self) -> Result<()> {
        let path = session_path();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text)
            .with_context(|| format!("no se pudo escribir la sesión en {}", path.display()))
    }
}
