use common::{
    Bindings, ErrorDetail, ExecuteRequest, ExecuteResponse, FlowError, GenerateRequest,
    GenerateResponse, LoadTableRequest, LoadTableResponse, Records, RunRecord, SaveTableRequest,
    SaveTableResponse, ScheduleCreateResponse, ScheduleInfo, ScheduleRequest, StageSpec,
    TablesResponse, WorkflowDefinition, WorkflowSaveRequest, WorkflowSaveResponse,
};
use reqwest::Client;
use tracing::debug;

/// - En Docker: AUTOFLOW_API_URL=http://backend:8000
/// - Local: default http://localhost:8000
pub fn default_base_url() -> String {
    std::env::var("AUTOFLOW_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn transport_error(err: reqwest::Error) -> FlowError {
    FlowError::Collaborator {
        detail: err.to_string(),
    }
}

/// Cliente HTTP contra los servicios colaboradores (generación, ejecución,
/// storage, workflow store y schedules), todos detrás de una misma base URL.
///
/// Toda respuesta se trata como no confiable: un status no exitoso o un
/// body malformado degradan a `FlowError::Collaborator` con el `detail`
/// del payload cuando existe, nunca a un pánico.
#[derive(Clone)]
pub struct RemoteServices {
    client: Client,
    base_url: String,
}

impl RemoteServices {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(default_base_url())
    }

    /// Convierte una respuesta no exitosa en error, rescatando el campo
    /// `detail` del payload si viene.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, FlowError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let detail = match resp.json::<ErrorDetail>().await {
            Ok(payload) => payload.detail,
            Err(_) => format!("el servicio respondió {}", status),
        };

        Err(FlowError::Collaborator { detail })
    }

    /* --------- generación --------- */

    pub async fn generate(
        &self,
        datasets: &Bindings,
        prompt: &str,
        task_type: &str,
    ) -> Result<GenerateResponse, FlowError> {
        let url = format!("{}/process_multi", self.base_url);
        debug!("POST {} (task_type={})", url, task_type);

        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                datasets: datasets.clone(),
                prompt: prompt.to_string(),
                task_type: task_type.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }

    /* --------- ejecución --------- */

    pub async fn execute(&self, datasets: &Bindings, code: &str) -> Result<Records, FlowError> {
        let url = format!("{}/execute_multi", self.base_url);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                datasets: datasets.clone(),
                code: code.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: ExecuteResponse =
            Self::check(resp).await?.json().await.map_err(transport_error)?;
        Ok(body.result)
    }

    /* --------- storage tabular --------- */

    pub async fn list_tables(&self) -> Result<Vec<String>, FlowError> {
        let url = format!("{}/db/tables", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        let body: TablesResponse =
            Self::check(resp).await?.json().await.map_err(transport_error)?;
        Ok(body.tables)
    }

    pub async fn load_table(&self, table_name: &str) -> Result<Records, FlowError> {
        let url = format!("{}/db/load", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&LoadTableRequest {
                table_name: table_name.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: LoadTableResponse =
            Self::check(resp).await?.json().await.map_err(transport_error)?;
        Ok(body.data)
    }

    pub async fn save_table(
        &self,
        table_name: &str,
        data: &Records,
    ) -> Result<SaveTableResponse, FlowError> {
        let url = format!("{}/db/save", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&SaveTableRequest {
                table_name: table_name.to_string(),
                data: data.clone(),
                if_exists: "replace".to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }

    /* --------- workflow store --------- */

    pub async fn save_workflow(
        &self,
        name: &str,
        steps: Vec<StageSpec>,
    ) -> Result<String, FlowError> {
        let url = format!("{}/workflows", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&WorkflowSaveRequest {
                name: name.to_string(),
                steps,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: WorkflowSaveResponse =
            Self::check(resp).await?.json().await.map_err(transport_error)?;
        Ok(body.id)
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, FlowError> {
        let url = format!("{}/workflows", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }

    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<(), FlowError> {
        let url = format!("{}/workflows/{}", self.base_url, workflow_id);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(resp).await?;
        Ok(())
    }

    /* --------- schedules --------- */

    pub async fn create_schedule(
        &self,
        workflow_id: &str,
        kind: &str,
        value: &str,
    ) -> Result<ScheduleCreateResponse, FlowError> {
        let url = format!("{}/schedules", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&ScheduleRequest {
                workflow_id: workflow_id.to_string(),
                kind: kind.to_string(),
                value: value.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }

    pub async fn list_schedules(&self) -> Result<Vec<ScheduleInfo>, FlowError> {
        let url = format!("{}/schedules", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }

    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<(), FlowError> {
        let url = format!("{}/schedules/{}", self.base_url, schedule_id);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(resp).await?;
        Ok(())
    }

    pub async fn run_history(&self, workflow_id: &str) -> Result<Vec<RunRecord>, FlowError> {
        let url = format!("{}/schedules/history/{}", self.base_url, workflow_id);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        Self::check(resp).await?.json().await.map_err(transport_error)
    }
}
