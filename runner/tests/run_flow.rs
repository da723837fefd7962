//! Tests de integración del runner contra un mock in-process de los
//! servicios colaboradores (generación, ejecución, storage y workflow
//! store), servidos con axum en un puerto efímero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    DatasetRegistry, FlowError, InputRef, Instruction, Pipeline, Records, RunRecord, StageDraft,
    StageGraph, WorkflowDefinition,
};
use runner::{
    bridge, create_stage, reconstruct_historical, rework_stage, run_pipeline, RemoteServices,
};
use serde_json::{json, Value};

/* --------- mock de colaboradores --------- */

#[derive(Default)]
struct MockState {
    /// storage tabular en memoria
    tables: HashMap<String, Records>,
    /// orden observado de llamadas, para verificar el protocolo
    calls: Vec<String>,
    /// si el código ejecutado contiene este marcador, el mock devuelve 500
    fail_marker: Option<String>,
    workflows: Vec<WorkflowDefinition>,
}

type Shared = Arc<Mutex<MockState>>;

async fn process_multi(
    State(state): State<Shared>,
    Json(req): Json<common::GenerateRequest>,
) -> (StatusCode, Json<Value>) {
    let mut st = state.lock().unwrap();
    st.calls.push(format!("generate:{}", req.prompt));

    // código generado que referencia los bindings ofrecidos
    let names: Vec<String> = req.datasets.keys().cloned().collect();
    let code = format!("# {}\ndf_result = {}", req.prompt, names.join(" + "));
    (
        StatusCode::OK,
        Json(json!({ "code": code, "result": [{"preview": true}] })),
    )
}

async fn execute_multi(
    State(state): State<Shared>,
    Json(req): Json<common::ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    let mut st = state.lock().unwrap();
    let names: Vec<String> = req.datasets.keys().cloned().collect();
    st.calls
        .push(format!("execute:{}:[{}]", req.code, names.join(",")));

    if let Some(marker) = &st.fail_marker {
        if req.code.contains(marker) {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "ejecución simulada fallida" })),
            );
        }
    }

    (
        StatusCode::OK,
        Json(json!({ "result": [{"executed": req.code}] })),
    )
}

async fn load_table(
    State(state): State<Shared>,
    Json(req): Json<common::LoadTableRequest>,
) -> (StatusCode, Json<Value>) {
    let mut st = state.lock().unwrap();
    st.calls.push(format!("load:{}", req.table_name));

    match st.tables.get(&req.table_name) {
        Some(rows) => (
            StatusCode::OK,
            Json(json!({ "name": req.table_name, "data": rows })),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": format!("no existe la tabla {}", req.table_name) })),
        ),
    }
}

async fn save_table(
    State(state): State<Shared>,
    Json(req): Json<common::SaveTableRequest>,
) -> (StatusCode, Json<Value>) {
    let mut st = state.lock().unwrap();
    st.calls.push(format!("save:{}", req.table_name));
    let rows = req.data.len();
    st.tables.insert(req.table_name.clone(), req.data);

    (
        StatusCode::OK,
        Json(json!({ "message": format!("Saved '{}'", req.table_name), "rows": rows })),
    )
}

async fn list_workflows(State(state): State<Shared>) -> Json<Vec<WorkflowDefinition>> {
    Json(state.lock().unwrap().workflows.clone())
}

async fn save_workflow(
    State(state): State<Shared>,
    Json(req): Json<common::WorkflowSaveRequest>,
) -> (StatusCode, Json<Value>) {
    let mut st = state.lock().unwrap();
    let id = format!("wf-{}", st.workflows.len() + 1);
    st.workflows.push(WorkflowDefinition {
        id: id.clone(),
        name: req.name,
        steps: req.steps,
    });

    (
        StatusCode::OK,
        Json(json!({ "message": "Saved", "id": id })),
    )
}

/// Levanta el mock en un puerto efímero y devuelve su base URL.
async fn start_mock(state: Shared) -> String {
    let app = Router::new()
        .route("/process_multi", post(process_multi))
        .route("/execute_multi", post(execute_multi))
        .route("/db/load", post(load_table))
        .route("/db/save", post(save_table))
        .route("/workflows", get(list_workflows).post(save_workflow))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/* --------- helpers --------- */

fn general(text: &str) -> Instruction {
    Instruction::General {
        text: text.to_string(),
    }
}

fn draft(code: &str, input_refs: Vec<InputRef>) -> StageDraft {
    StageDraft {
        input_refs,
        instruction: general("t"),
        generated_code: code.to_string(),
        result_rows: vec![],
    }
}

/// Pipeline con un dataset "orders" y tres etapas encadenadas.
fn three_stage_pipeline() -> Pipeline {
    let mut datasets = DatasetRegistry::new();
    let orders_id = datasets.load("orders", vec![json!({"a": 1})]).id.clone();

    let mut graph = StageGraph::new();
    let s1 = graph
        .append(draft(
            "df_result = df_orders.head()",
            vec![InputRef::Dataset(orders_id)],
        ))
        .id
        .clone();
    let s2 = graph
        .append(draft(
            "df_result = df_step_1.dropna()",
            vec![InputRef::Stage(s1)],
        ))
        .id
        .clone();
    graph.append(draft(
        "df_result = df_step_2.sum()",
        vec![InputRef::Stage(s2)],
    ));

    Pipeline { datasets, graph }
}

fn calls_of(state: &Shared) -> Vec<String> {
    state.lock().unwrap().calls.clone()
}

/* --------- orquestador --------- */

#[tokio::test]
async fn run_ejecuta_en_orden_y_checkpointea_antes_de_la_siguiente_etapa() {
    std::env::set_var("AUTOFLOW_STAGE_PACING_MS", "0");

    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let mut pipeline = three_stage_pipeline();
    let outcome = run_pipeline(&remote, &mut pipeline).await.unwrap();

    let run = &outcome.run_id;
    assert_eq!(outcome.final_table, format!("final_{}", run));

    // protocolo observado: execute y save intercalados, en orden de secuencia
    let calls = calls_of(&state);
    let kinds: Vec<String> = calls
        .iter()
        .map(|c| c.split(':').take(2).collect::<Vec<_>>().join(":"))
        .collect();
    assert_eq!(kinds.len(), 6);
    assert!(kinds[0].starts_with("execute"));
    assert_eq!(kinds[1], format!("save:temp_{}_step_1", run));
    assert!(kinds[2].starts_with("execute"));
    assert_eq!(kinds[3], format!("save:temp_{}_step_2", run));
    assert!(kinds[4].starts_with("execute"));
    assert_eq!(kinds[5], format!("save:final_{}", run));

    // la etapa 2 resolvió df_step_1 con el resultado fresco de la etapa 1
    assert!(calls[2].contains("[df_step_1]"));
    assert!(calls[4].contains("[df_step_2]"));

    // los tres checkpoints quedaron en storage
    let st = state.lock().unwrap();
    assert!(st.tables.contains_key(&format!("temp_{}_step_1", run)));
    assert!(st.tables.contains_key(&format!("temp_{}_step_2", run)));
    assert!(st.tables.contains_key(&format!("final_{}", run)));
    drop(st);

    // y el grafo en memoria quedó con los resultados materializados
    for stage in pipeline.graph.stages() {
        assert!(!stage.result_rows.is_empty());
    }
}

#[tokio::test]
async fn falla_a_mitad_de_run_aborta_el_resto_y_conserva_checkpoints() {
    std::env::set_var("AUTOFLOW_STAGE_PACING_MS", "0");

    let state: Shared = Shared::default();
    state.lock().unwrap().fail_marker = Some("dropna".to_string()); // etapa 2
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let mut pipeline = three_stage_pipeline();
    let err = run_pipeline(&remote, &mut pipeline).await.unwrap_err();

    match err {
        FlowError::StageFailed {
            sequence_number,
            detail,
            ..
        } => {
            assert_eq!(sequence_number, 2);
            assert_eq!(detail, "ejecución simulada fallida");
        }
        other => panic!("se esperaba StageFailed, vino {:?}", other),
    }

    let calls = calls_of(&state);
    // el checkpoint de la etapa 1 se emitió antes de la falla y persiste
    assert!(calls.iter().any(|c| c.starts_with("save:temp_") && c.ends_with("_step_1")));
    let st = state.lock().unwrap();
    assert_eq!(st.tables.len(), 1);
    drop(st);

    // la etapa 3 nunca se invocó
    assert!(!calls.iter().any(|c| c.contains("df_step_2.sum")));
}

#[tokio::test]
async fn validaciones_de_entrada_se_rechazan_antes_de_llamar_servicios() {
    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    // sin datasets
    let mut vacio = Pipeline::new();
    let err = run_pipeline(&remote, &mut vacio).await.unwrap_err();
    assert!(matches!(err, FlowError::UserInput(_)));

    // con datasets pero sin etapas
    let mut sin_etapas = Pipeline::new();
    sin_etapas.datasets.load("orders", vec![json!({"a": 1})]);
    let err = run_pipeline(&remote, &mut sin_etapas).await.unwrap_err();
    assert!(matches!(err, FlowError::UserInput(_)));

    // ninguna llamada remota salió
    assert!(calls_of(&state).is_empty());
}

#[tokio::test]
async fn fallback_de_bindings_llega_al_servicio_de_ejecucion() {
    std::env::set_var("AUTOFLOW_STAGE_PACING_MS", "0");

    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let mut datasets = DatasetRegistry::new();
    let orders_id = datasets.load("orders", vec![json!({"a": 1})]).id.clone();
    let mut graph = StageGraph::new();
    // el código no menciona df_orders: se ejecuta con el fallback declarado
    graph.append(draft(
        "df_result = hacer_magia()",
        vec![InputRef::Dataset(orders_id)],
    ));
    let mut pipeline = Pipeline { datasets, graph };

    run_pipeline(&remote, &mut pipeline).await.unwrap();

    let calls = calls_of(&state);
    assert!(calls[0].starts_with("execute:"));
    assert!(calls[0].contains("[df_orders]"));
}

/* --------- round-trip de generación --------- */

#[tokio::test]
async fn create_stage_agrega_y_rework_stage_edita_in_place() {
    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let mut pipeline = Pipeline::new();
    let orders_id = pipeline
        .datasets
        .load("orders", vec![json!({"a": 1})])
        .id
        .clone();

    let created = create_stage(
        &remote,
        &mut pipeline,
        vec![InputRef::Dataset(orders_id.clone())],
        general("sumar por mes"),
    )
    .await
    .unwrap();

    assert_eq!(created.sequence_number, 1);
    assert!(created.generated_code.contains("df_orders"));
    assert!(!created.result_rows.is_empty()); // preview materializado

    let reworked = rework_stage(
        &remote,
        &mut pipeline,
        &created.id,
        vec![InputRef::Dataset(orders_id)],
        general("promediar por mes"),
    )
    .await
    .unwrap();

    // misma identidad y posición, instrucción y código nuevos
    assert_eq!(reworked.id, created.id);
    assert_eq!(reworked.sequence_number, 1);
    assert!(reworked.generated_code.contains("promediar por mes"));
    assert_eq!(pipeline.graph.len(), 1);

    // validaciones: sin inputs o sin texto, no se llama al servicio
    let before = calls_of(&state).len();
    let err = create_stage(&remote, &mut pipeline, vec![], general("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::UserInput(_)));
    let err = create_stage(
        &remote,
        &mut pipeline,
        vec![InputRef::Stage("nope".to_string())],
        general("  "),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FlowError::UserInput(_)));
    assert_eq!(calls_of(&state).len(), before);
}

/* --------- puente de persistencia --------- */

#[tokio::test]
async fn guardar_y_cargar_un_workflow_contra_el_store() {
    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let pipeline = three_stage_pipeline();
    let id = bridge::save_workflow(&remote, "cierre mensual", pipeline.graph.stages())
        .await
        .unwrap();
    assert_eq!(id, "wf-1");

    let (definition, stages) = bridge::load_workflow(&remote, &id).await.unwrap();
    assert_eq!(definition.name, "cierre mensual");
    assert_eq!(stages.len(), 3);
    for (orig, back) in pipeline.graph.stages().iter().zip(&stages) {
        assert_eq!(back.id, orig.id);
        assert_eq!(back.sequence_number, orig.sequence_number);
        assert_eq!(back.generated_code, orig.generated_code);
        assert!(back.result_rows.is_empty());
    }

    let err = bridge::load_workflow(&remote, "wf-999").await.unwrap_err();
    assert!(matches!(err, FlowError::UserInput(_)));
}

#[tokio::test]
async fn reconstruccion_historica_tolera_checkpoints_faltantes() {
    let state: Shared = Shared::default();
    // sólo existe el checkpoint final; el de la etapa 1 se perdió
    state.lock().unwrap().tables.insert(
        "run_20240101000000_final".to_string(),
        vec![json!({"total": 10})],
    );
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let definition: WorkflowDefinition = serde_json::from_value(json!({
        "id": "wf-1",
        "name": "cierre",
        "steps": [
            {
                "id": "stage-1",
                "sequence_number": 1,
                "input_refs": [],
                "instruction": {"mode": "GENERAL", "text": "sumar"},
                "generated_code": "df_result = df_orders.sum()"
            },
            {
                "id": "stage-2",
                "sequence_number": 2,
                "input_refs": [{"kind": "stage", "id": "stage-1"}],
                "instruction": {"mode": "GENERAL", "text": "total"},
                "generated_code": "df_result = df_step_1.sum()"
            }
        ]
    }))
    .unwrap();

    let run: RunRecord = serde_json::from_value(json!({
        "id": "run_20240101000000",
        "workflow_id": "wf-1",
        "status": "COMPLETED",
        "start_time": "2024-01-01T00:00:00Z",
        "end_time": "2024-01-01T00:05:00Z",
        "output_table": "run_20240101000000_final",
        "error_msg": null
    }))
    .unwrap();

    let stages = reconstruct_historical(&remote, &run, &definition).await;

    assert_eq!(stages.len(), 2);
    // la etapa 1 queda vacía, pero la etapa 2 igual intentó y trajo su fetch
    assert!(stages[0].result_rows.is_empty());
    assert_eq!(stages[1].result_rows, vec![json!({"total": 10})]);

    let calls = calls_of(&state);
    assert_eq!(
        calls,
        vec![
            "load:run_20240101000000_step_1".to_string(),
            "load:run_20240101000000_final".to_string(),
        ]
    );
}

/* --------- respuestas no confiables --------- */

#[tokio::test]
async fn el_detail_del_colaborador_se_superficializa() {
    let state: Shared = Shared::default();
    let base = start_mock(state.clone()).await;
    let remote = RemoteServices::new(base);

    let err = remote.load_table("inexistente").await.unwrap_err();
    match err {
        FlowError::Collaborator { detail } => {
            assert_eq!(detail, "no existe la tabla inexistente");
        }
        other => panic!("se esperaba Collaborator, vino {:?}", other),
    }
}
