mod session;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{edges, layout, InputRef, Instruction, Records, StageGraph};
use runner::{
    bridge, create_stage, reconstruct_historical, rework_stage, run_pipeline, RemoteServices,
};
use session::Session;

#[derive(Parser)]
#[command(name = "autoflow")]
#[command(about = "CLI para armar y ejecutar pipelines de transformación sobre los servicios remotos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lista las tablas disponibles en storage
    Tables {
        /// Incluye también las tablas internas de checkpoints
        #[arg(long)]
        all: bool,
    },
    /// Carga una tabla de storage como dataset fuente del pipeline
    Load {
        #[arg(value_name = "TABLA")]
        table: String,
    },
    /// Lista los datasets cargados en la sesión
    Datasets,
    /// Saca un dataset de la sesión (las etapas que lo referencian quedan)
    DropDataset {
        #[arg(value_name = "DATASET_ID")]
        id: String,
    },
    /// Genera una etapa nueva al final del pipeline a partir de una instrucción
    AddStage {
        /// Input de la etapa: dataset:<id> o stage:<id> (repetible)
        #[arg(long = "input", value_name = "INPUT", required = true)]
        inputs: Vec<String>,

        /// Módulo plantillado en vez de instrucción libre (p. ej. RECON)
        #[arg(long)]
        module: Option<String>,

        /// Instrucción en lenguaje natural (u objetivo del módulo)
        #[arg(value_name = "INSTRUCCION")]
        text: String,
    },
    /// Regenera una etapa existente in-place: mismo id, misma posición
    EditStage {
        #[arg(value_name = "STAGE_ID")]
        id: String,

        #[arg(long = "input", value_name = "INPUT", required = true)]
        inputs: Vec<String>,

        #[arg(long)]
        module: Option<String>,

        #[arg(value_name = "INSTRUCCION")]
        text: String,
    },
    /// Muestra el pipeline: datasets, etapas, dependencias y layout
    Show,
    /// Ejecuta el pipeline completo, etapa por etapa con checkpoints
    Run,
    /// Guarda el pipeline como workflow nombrado (estructura, sin datos)
    Save {
        #[arg(value_name = "NOMBRE")]
        name: String,
    },
    /// Lista los workflows guardados
    Workflows,
    /// Abre un workflow guardado como pipeline de la sesión
    Open {
        #[arg(value_name = "WORKFLOW_ID")]
        id: String,
    },
    /// Borra un workflow guardado
    DeleteWorkflow {
        #[arg(value_name = "WORKFLOW_ID")]
        id: String,
    },
    /// Agenda la ejecución periódica de un workflow
    Schedule {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        /// "interval" (minutos) o "daily" (hora HH:MM)
        #[arg(value_name = "TIPO")]
        kind: String,

        #[arg(value_name = "VALOR")]
        value: String,
    },
    /// Lista los schedules activos
    Schedules,
    /// Da de baja un schedule
    Unschedule {
        #[arg(value_name = "SCHEDULE_ID")]
        id: String,
    },
    /// Lista los runs históricos de un workflow agendado
    History {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,
    },
    /// Reconstruye un run histórico para inspeccionarlo (solo lectura)
    Inspect {
        #[arg(value_name = "WORKFLOW_ID")]
        workflow_id: String,

        #[arg(value_name = "RUN_ID")]
        run_id: String,
    },
    /// Proyecto nuevo: borra datasets y etapas de la sesión
    Reset {
        /// No pedir confirmación
        #[arg(long)]
        yes: bool,
    },
}

fn parse_input_ref(raw: &str) -> Result<InputRef> {
    match raw.split_once(':') {
        Some(("dataset", id)) if !id.is_empty() => Ok(InputRef::Dataset(id.to_string())),
        Some(("stage", id)) if !id.is_empty() => Ok(InputRef::Stage(id.to_string())),
        _ => bail!("input inválido '{}': use dataset:<id> o stage:<id>", raw),
    }
}

fn parse_inputs(raw: &[String]) -> Result<Vec<InputRef>> {
    raw.iter().map(|r| parse_input_ref(r)).collect()
}

fn build_instruction(module: Option<String>, text: String) -> Instruction {
    match module {
        Some(name) => Instruction::Module {
            name,
            objective: text,
        },
        None => Instruction::General { text },
    }
}

/// Los comandos que mutan o ejecutan el pipeline no corren mientras la
/// sesión muestra un run histórico.
fn ensure_live(session: &Session) -> Result<()> {
    if let Some(run) = &session.historical_run_id {
        bail!(
            "la sesión muestra el run histórico {}; use 'open' o 'reset' para volver al pipeline vivo",
            run
        );
    }
    Ok(())
}

/// Tabla interna de checkpoints o de historia de runs.
fn is_internal_table(name: &str) -> bool {
    name.starts_with("temp_") || name.starts_with("final_") || name.starts_with("run_")
}

fn print_rows(rows: &Records, limit: usize) {
    for row in rows.iter().take(limit) {
        println!("    {}", row);
    }
    if rows.len() > limit {
        println!("    ... ({} filas en total)", rows.len());
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{} (y/N)", prompt);
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "s" | "S"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let remote = RemoteServices::from_env();
    let mut session = Session::load()?;

    match cli.command {
        Commands::Tables { all } => {
            let tables = remote.list_tables().await?;
            let visibles: Vec<&String> = tables
                .iter()
                .filter(|t| all || !is_internal_table(t))
                .collect();

            if visibles.is_empty() {
                println!("No hay tablas disponibles.");
            } else {
                println!("Tablas:");
                for t in visibles {
                    println!("  - {}", t);
                }
            }
        }

        Commands::Load { table } => {
            let rows = remote.load_table(&table).await?;
            let dataset = session.pipeline.datasets.load(&table, rows);

            println!("Dataset cargado:");
            println!("  id: {}", dataset.id);
            println!("  nombre: {}", dataset.name);
            println!("  variable: {}", dataset.variable_name);
            println!("  filas: {}", dataset.rows.len());
        }

        Commands::Datasets => {
            if session.pipeline.datasets.is_empty() {
                println!("No hay datasets cargados.");
            } else {
                println!("Datasets:");
                for ds in session.pipeline.datasets.iter() {
                    println!(
                        "  - {} ({}, {} filas) [{}]",
                        ds.name,
                        ds.variable_name,
                        ds.rows.len(),
                        ds.id
                    );
                }
            }
        }

        Commands::DropDataset { id } => {
            ensure_live(&session)?;
            match session.pipeline.datasets.remove(&id) {
                Some(ds) => println!("Dataset '{}' eliminado de la sesión.", ds.name),
                None => println!("No existe el dataset con id {}", id),
            }
        }

        Commands::AddStage {
            inputs,
            module,
            text,
        } => {
            ensure_live(&session)?;
            let input_refs = parse_inputs(&inputs)?;
            let instruction = build_instruction(module, text);

            let stage = create_stage(&remote, &mut session.pipeline, input_refs, instruction)
                .await
                .context("no se pudo crear la etapa")?;

            println!("Etapa creada:");
            println!("  id: {}", stage.id);
            println!("  secuencia: {}", stage.sequence_number);
            println!("  código:");
            for line in stage.generated_code.lines() {
                println!("    {}", line);
            }
            if !stage.result_rows.is_empty() {
                println!("  preview:");
                print_rows(&stage.result_rows, 5);
            }
        }

        Commands::EditStage {
            id,
            inputs,
            module,
            text,
        } => {
            ensure_live(&session)?;
            let input_refs = parse_inputs(&inputs)?;
            let instruction = build_instruction(module, text);

            let stage = rework_stage(&remote, &mut session.pipeline, &id, input_refs, instruction)
                .await
                .context("no se pudo reconfigurar la etapa")?;

            println!("Etapa reconfigurada:");
            println!("  id: {}", stage.id);
            println!("  secuencia: {}", stage.sequence_number);
            println!("  código:");
            for line in stage.generated_code.lines() {
                println!("    {}", line);
            }
        }

        Commands::Show => {
            let pipeline = &session.pipeline;
            if let Some(run) = &session.historical_run_id {
                println!("(vista de solo lectura del run histórico {})", run);
            }

            println!("Datasets:");
            if pipeline.datasets.is_empty() {
                println!("  (ninguno)");
            }
            for ds in pipeline.datasets.iter() {
                println!(
                    "  - {} ({}, {} filas) [{}]",
                    ds.name,
                    ds.variable_name,
                    ds.rows.len(),
                    ds.id
                );
            }

            println!("Etapas:");
            if pipeline.graph.is_empty() {
                println!("  (ninguna)");
            }
            for stage in pipeline.graph.stages() {
                println!(
                    "  {}. [{}] {} ({} filas) [{}]",
                    stage.sequence_number,
                    stage.instruction.task_type(),
                    stage.instruction.text(),
                    stage.result_rows.len(),
                    stage.id
                );
            }

            let deps = edges(&pipeline.datasets, pipeline.graph.stages());
            if !deps.is_empty() {
                println!("Dependencias:");
                for edge in &deps {
                    let seq = pipeline
                        .graph
                        .get(&edge.target)
                        .map(|s| s.sequence_number)
                        .unwrap_or(0);
                    println!("  {} -> etapa {}", edge.source, seq);
                }
            }

            let nodes = layout(&pipeline.datasets, pipeline.graph.stages(), &deps);
            if !nodes.is_empty() {
                println!("Layout:");
                for node in nodes {
                    println!(
                        "  {} @ rango {} ({:.0}, {:.0})",
                        node.label, node.rank, node.x, node.y
                    );
                }
            }
        }

        Commands::Run => {
            ensure_live(&session)?;
            let outcome = run_pipeline(&remote, &mut session.pipeline).await?;

            println!("Run completado:");
            println!("  run_id: {}", outcome.run_id);
            println!("  salida: {}", outcome.final_table);
            for stage in session.pipeline.graph.stages() {
                println!(
                    "  etapa {}: {} filas",
                    stage.sequence_number,
                    stage.result_rows.len()
                );
            }
        }

        Commands::Save { name } => {
            let id = bridge::save_workflow(&remote, &name, session.pipeline.graph.stages()).await?;
            session.workflow_id = Some(id.clone());
            println!("Workflow '{}' guardado con id {}", name, id);
        }

        Commands::Workflows => {
            let workflows = remote.list_workflows().await?;
            if workflows.is_empty() {
                println!("No hay workflows guardados.");
            } else {
                println!("Workflows:");
                for wf in workflows {
                    println!("  - {} ({} etapas) [{}]", wf.name, wf.steps.len(), wf.id);
                }
            }
        }

        Commands::Open { id } => {
            let (definition, stages) = bridge::load_workflow(&remote, &id).await?;
            session.pipeline.graph = StageGraph::hydrate(stages);
            session.workflow_id = Some(definition.id.clone());
            session.historical_run_id = None;

            println!(
                "Workflow '{}' abierto ({} etapas, resultados vacíos hasta ejecutar).",
                definition.name,
                definition.steps.len()
            );
        }

        Commands::DeleteWorkflow { id } => {
            remote.delete_workflow(&id).await?;
            if session.workflow_id.as_deref() == Some(id.as_str()) {
                session.workflow_id = None;
            }
            println!("Workflow {} eliminado.", id);
        }

        Commands::Schedule {
            workflow_id,
            kind,
            value,
        } => {
            if kind != "interval" && kind != "daily" {
                bail!("tipo de schedule inválido '{}': use interval o daily", kind);
            }
            let created = remote.create_schedule(&workflow_id, &kind, &value).await?;
            println!("{} (job {})", created.message, created.job_id);
        }

        Commands::Schedules => {
            let schedules = remote.list_schedules().await?;
            if schedules.is_empty() {
                println!("No hay schedules activos.");
            } else {
                println!("Schedules:");
                for s in schedules {
                    println!("  - {} (workflow {})", s.id, s.workflow_id);
                    println!("    trigger: {}", s.trigger);
                    println!("    próximo run: {}", s.next_run);
                }
            }
        }

        Commands::Unschedule { id } => {
            remote.delete_schedule(&id).await?;
            println!("Schedule {} dado de baja.", id);
        }

        Commands::History { workflow_id } => {
            let runs = remote.run_history(&workflow_id).await?;
            if runs.is_empty() {
                println!("No hay runs históricos para el workflow {}.", workflow_id);
            } else {
                println!("Runs de {}:", workflow_id);
                for run in runs {
                    println!("  - {} [{:?}]", run.id, run.status);
                    println!("    inicio: {}", run.start_time);
                    if let Some(end) = run.end_time {
                        println!("    fin: {}", end);
                    }
                    if let Some(table) = run.output_table {
                        println!("    salida: {}", table);
                    }
                    if let Some(err) = run.error_msg {
                        println!("    error: {}", err);
                    }
                }
            }
        }

        Commands::Inspect {
            workflow_id,
            run_id,
        } => {
            let runs = remote.run_history(&workflow_id).await?;
            let run = runs
                .into_iter()
                .find(|r| r.id == run_id)
                .with_context(|| format!("no existe el run {} en ese workflow", run_id))?;

            let (definition, _) = bridge::load_workflow(&remote, &workflow_id).await?;
            let stages = reconstruct_historical(&remote, &run, &definition).await;

            println!(
                "Run {} reconstruido ({} etapas) [{:?}]",
                run.id,
                stages.len(),
                run.status
            );
            for stage in &stages {
                println!(
                    "  etapa {}: {} filas",
                    stage.sequence_number,
                    stage.result_rows.len()
                );
            }

            session.pipeline.graph = StageGraph::hydrate(stages);
            session.workflow_id = Some(workflow_id);
            session.historical_run_id = Some(run_id);
            println!("La sesión quedó en modo solo lectura; 'show' muestra los datos del run.");
        }

        Commands::Reset { yes } => {
            if !session.pipeline.graph.is_empty()
                && !yes
                && !confirm("El pipeline tiene etapas, ¿borrar todo el progreso?")?
            {
                println!("Reset cancelado.");
                session.store()?;
                return Ok(());
            }

            session.pipeline.reset();
            session.workflow_id = None;
            session.historical_run_id = None;
            println!("Sesión reiniciada.");
        }
    }

    session.store()?;
    Ok(())
}
