use super::{ColumnType, Loader, ROW_COLUMNS};
use crate::error::{PipelineError, Result};
use crate::normalize::model::NormalizedRow;
use crate::utils::{parse_base_url, validate_table_name, BigQueryConfig};
use chrono::Utc;
use gcp_auth::{AuthenticationManager, CustomServiceAccount};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, RequestBuilder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};
use url::Url;

const SCOPES: &[&str; 1] = &["https://www.googleapis.com/auth/cloud-platform"];
const BOUNDARY: &str = "trending_load_boundary";

/// Where bearer tokens for the BigQuery API come from.
pub enum TokenSource {
    ServiceAccount(AuthenticationManager),
    Static(String),
}

impl TokenSource {
    async fn token(&self) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(manager) => manager
                .get_token(SCOPES)
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| PipelineError::DestinationWrite(format!("failed to get access token: {e}"))),
        }
    }
}

/// Cloud warehouse. Each call runs one load job and waits for it to finish.
pub struct BigQueryLoader {
    client: Client,
    base_url: Url,
    project: String,
    dataset: String,
    location: Option<String>,
    tokens: TokenSource,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: Option<JobStatus>,
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    /// int64 values are sent as strings
    output_rows: Option<String>,
}

impl Job {
    fn is_done(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "DONE")
    }

    fn output_rows(&self) -> Option<u64> {
        self.statistics
            .as_ref()?
            .load
            .as_ref()?
            .output_rows
            .as_deref()?
            .parse()
            .ok()
    }
}

fn bigquery_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Text => "STRING",
        ColumnType::Integer => "INTEGER",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

fn table_schema() -> Value {
    let fields: Vec<Value> = ROW_COLUMNS
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "type": bigquery_type(c.kind),
                "mode": if c.required { "REQUIRED" } else { "NULLABLE" },
            })
        })
        .collect();
    json!({ "fields": fields })
}

fn to_ndjson(rows: &[NormalizedRow]) -> Result<String> {
    let mut body = String::new();
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|e| PipelineError::DestinationWrite(format!("failed to encode row {}: {e}", row.video_id)))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

/// `multipart/related` body carrying the job configuration and the data.
fn multipart_body(configuration: &Value, data: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{configuration}\r\n\
         --{BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n\
         --{BOUNDARY}--\r\n"
    )
}

impl BigQueryLoader {
    pub fn new(config: &BigQueryConfig, project: impl Into<String>, tokens: TokenSource) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url, "BigQuery")?;
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build http client: {e}")))?;

        Ok(BigQueryLoader {
            client,
            base_url,
            project: project.into(),
            dataset: config.dataset.clone(),
            location: config.location.clone(),
            tokens,
            poll_interval: config.poll_interval,
        })
    }

    /// Picks credentials in order: static token, service-account key file, default credentials.
    pub async fn from_config(config: &BigQueryConfig) -> Result<Self> {
        if let Some(token) = &config.access_token {
            let project = config.project.clone().ok_or_else(|| {
                PipelineError::Config("BIGQUERY_PROJECT must be set when using BIGQUERY_ACCESS_TOKEN".to_string())
            })?;
            return Self::new(config, project, TokenSource::Static(token.clone()));
        }

        let manager = match &config.credentials_path {
            Some(path) => {
                debug!(path = %path.display(), "Using service account file");
                let service_account = CustomServiceAccount::from_file(path).map_err(|e| {
                    PipelineError::Config(format!("failed to read service account {}: {e}", path.display()))
                })?;
                AuthenticationManager::try_from(service_account)
                    .map_err(|e| PipelineError::Config(format!("failed to create authentication manager: {e}")))?
            }
            None => AuthenticationManager::new()
                .await
                .map_err(|e| PipelineError::Config(format!("no Google credentials found: {e}")))?,
        };

        let project = match &config.project {
            Some(project) => project.clone(),
            None => manager
                .project_id()
                .await
                .map_err(|e| PipelineError::Config(format!("failed to resolve project id: {e}")))?,
        };

        Self::new(config, project, TokenSource::ServiceAccount(manager))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PipelineError::Config(format!("invalid BigQuery path {path}: {e}")))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Job> {
        let token = self.tokens.token().await?;
        let response = request
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| PipelineError::DestinationWrite(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "BigQuery {what} failed");
            return Err(PipelineError::DestinationWrite(format!("{what} returned {status}: {body}")));
        }

        response
            .json::<Job>()
            .await
            .map_err(|e| PipelineError::DestinationWrite(format!("failed to decode {what} response: {e}")))
    }

    async fn submit(&self, rows: &[NormalizedRow], table_name: &str) -> Result<Job> {
        let job_id = format!(
            "trending_{table_name}_{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        let mut job_reference = json!({ "projectId": self.project, "jobId": job_id });
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }

        let configuration = json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project,
                        "datasetId": self.dataset,
                        "tableId": table_name,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "schema": table_schema(),
                }
            }
        });

        let mut url = self.endpoint(&format!("upload/bigquery/v2/projects/{}/jobs", self.project))?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");

        let body = multipart_body(&configuration, &to_ndjson(rows)?);
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={BOUNDARY}"))
            .body(body);

        self.send(request, "load job submission").await
    }

    async fn poll(&self, job: &Job) -> Result<Job> {
        let mut url = self.endpoint(&format!(
            "bigquery/v2/projects/{}/jobs/{}",
            self.project, job.job_reference.job_id
        ))?;
        if let Some(location) = job.job_reference.location.as_ref().or(self.location.as_ref()) {
            url.query_pairs_mut().append_pair("location", location);
        }

        self.send(self.client.get(url), "job status").await
    }

    fn check_result(&self, job: &Job, table_name: &str) -> Result<()> {
        let Some(err) = job.status.as_ref().and_then(|s| s.error_result.as_ref()) else {
            return Ok(());
        };

        let reason = err.reason.clone().unwrap_or_default();
        let message = err.message.clone().unwrap_or_default();
        error!(job_id = %job.job_reference.job_id, reason = %reason, message = %message, "BigQuery load job failed");

        if reason == "invalid" && message.to_lowercase().contains("schema") {
            return Err(PipelineError::SchemaDrift {
                table: format!("{}.{}", self.dataset, table_name),
                detail: message,
            });
        }
        Err(PipelineError::DestinationWrite(format!("load job {}: {reason}: {message}", job.job_reference.job_id)))
    }
}

impl Loader for BigQueryLoader {
    async fn load(&self, rows: &[NormalizedRow], table_name: &str) -> Result<u64> {
        validate_table_name(table_name)?;
        if rows.is_empty() {
            info!(table = %table_name, "No rows to load");
            return Ok(0);
        }

        let mut job = self.submit(rows, table_name).await?;
        debug!(job_id = %job.job_reference.job_id, "Submitted load job");

        while !job.is_done() {
            sleep(self.poll_interval).await;
            job = self.poll(&job).await?;
            debug!(job_id = %job.job_reference.job_id, state = ?job.status.as_ref().map(|s| &s.state), "Polled load job");
        }

        self.check_result(&job, table_name)?;

        let written = job.output_rows().unwrap_or(rows.len() as u64);
        info!(
            table = %format!("{}.{}.{}", self.project, self.dataset, table_name),
            rows = written,
            "Loaded rows into bigquery"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn config(server: &MockServer) -> BigQueryConfig {
        BigQueryConfig {
            base_url: server.uri(),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn loader(server: &MockServer) -> BigQueryLoader {
        BigQueryLoader::new(&config(server), "proj", TokenSource::Static("tok".to_string())).unwrap()
    }

    fn row(id: &str) -> NormalizedRow {
        NormalizedRow {
            video_id: id.to_string(),
            trending_at: "2023-05-07T10:00:00Z".to_string(),
            view_count: Some(1),
            ..Default::default()
        }
    }

    fn job(state: &str, extra: Value) -> Value {
        let mut job = json!({
            "jobReference": {"projectId": "proj", "jobId": "job-1", "location": "US"},
            "status": {"state": state},
        });
        if let (Some(target), Some(extra)) = (job.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        job
    }

    #[tokio::test]
    async fn submits_append_job_and_waits_for_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .and(query_param("uploadType", "multipart"))
            .and(header("authorization", "Bearer tok"))
            .and(body_string_contains("WRITE_APPEND"))
            .and(body_string_contains("CREATE_IF_NEEDED"))
            .and(body_string_contains("\"tableId\":\"trending_videos\""))
            .and(body_string_contains("\"videoId\":\"b\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(job("RUNNING", json!({}))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/proj/jobs/job-1"))
            .and(query_param("location", "US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job(
                "DONE",
                json!({"statistics": {"load": {"outputRows": "2"}}}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let written = loader(&server).load(&[row("a"), row("b")], "trending_videos").await.unwrap();

        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn failed_job_is_a_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobReference": {"projectId": "proj", "jobId": "job-1"},
                "status": {"state": "DONE", "errorResult": {"reason": "backendError", "message": "try later"}}
            })))
            .mount(&server)
            .await;

        let err = loader(&server).load(&[row("a")], "trending_videos").await.unwrap_err();

        assert!(matches!(err, PipelineError::DestinationWrite(message) if message.contains("backendError")));
    }

    #[tokio::test]
    async fn schema_rejection_is_schema_drift() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobReference": {"projectId": "proj", "jobId": "job-1"},
                "status": {
                    "state": "DONE",
                    "errorResult": {"reason": "invalid", "message": "Provided Schema does not match Table proj:youtube.trending_videos"}
                }
            })))
            .mount(&server)
            .await;

        let err = loader(&server).load(&[row("a")], "trending_videos").await.unwrap_err();

        assert!(matches!(err, PipelineError::SchemaDrift { table, .. } if table == "youtube.trending_videos"));
    }

    #[tokio::test]
    async fn rejected_request_is_a_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthenticated"))
            .mount(&server)
            .await;

        let err = loader(&server).load(&[row("a")], "trending_videos").await.unwrap_err();

        assert!(matches!(err, PipelineError::DestinationWrite(message) if message.contains("401")));
    }

    #[tokio::test]
    async fn empty_batch_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert_eq!(loader(&server).load(&[], "trending_videos").await.unwrap(), 0);
    }

    #[test]
    fn schema_uses_bigquery_types() {
        let schema = table_schema();
        let fields = schema["fields"].as_array().unwrap();
        assert_eq!(fields.len(), ROW_COLUMNS.len());
        assert_eq!(fields[0], json!({"name": "videoId", "type": "STRING", "mode": "REQUIRED"}));
        assert!(fields.contains(&json!({"name": "caption", "type": "BOOLEAN", "mode": "NULLABLE"})));
        assert!(fields.contains(&json!({"name": "durationSec", "type": "INTEGER", "mode": "NULLABLE"})));
    }

    #[test]
    fn ndjson_has_one_line_per_row() {
        let body = to_ndjson(&[row("a"), row("b")]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["videoId"], "a");
        assert_eq!(first["tags"], Value::Null);
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gateway/upload/bigquery/v2/projects/proj/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job(
                "DONE",
                json!({"statistics": {"load": {"outputRows": "1"}}}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let config = BigQueryConfig {
            base_url: format!("{}/gateway", server.uri()),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        let loader = BigQueryLoader::new(&config, "proj", TokenSource::Static("tok".to_string())).unwrap();

        assert_eq!(loader.load(&[row("a")], "trending_videos").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn static_token_requires_project() {
        let config = BigQueryConfig {
            access_token: Some("tok".to_string()),
            ..Default::default()
        };
        assert!(matches!(BigQueryLoader::from_config(&config).await, Err(PipelineError::Config(_))));
    }
}
