use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The manager answered with a non-2xx status and `{detail}`.
    #[error("manager returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Success body shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

/// Data of `GET /status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessStatus {
    pub state: String,
    pub running: bool,
    pub pid: Option<u32>,
    pub started_at: Option<u64>,
    pub uptime_secs: Option<f64>,
    pub cpu_percent: Option<f32>,
    pub memory_bytes: Option<u64>,
    pub external: bool,
    pub message: String,
}

/// Data of `GET /logs/tail/{file}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogTail {
    pub filename: String,
    pub total_lines: usize,
    pub returned_lines: usize,
    pub lines: Vec<String>,
    pub file_size: u64,
}

pub struct ManagerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ManagerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Envelope<T>, ClientError> {
        Self::decode(builder.send().await?).await
    }

    pub async fn status(&self) -> Result<ProcessStatus, ClientError> {
        let envelope: Envelope<ProcessStatus> = self.send(self.request(Method::GET, "/status")).await?;
        Ok(envelope.data)
    }

    pub async fn start(&self) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/start")).await
    }

    pub async fn stop(&self) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/stop")).await
    }

    pub async fn restart(&self) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/restart")).await
    }

    pub async fn fix_permissions(&self) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/fix-permissions")).await
    }

    /// The whole proxy configuration document.
    pub async fn get_config(&self) -> Result<Value, ClientError> {
        let envelope: Envelope<Value> = self.send(self.request(Method::GET, "/config")).await?;
        Ok(envelope.data)
    }

    /// One value, addressed like `Services.0.Listen`.
    pub async fn get_value(&self, path: &str) -> Result<Value, ClientError> {
        let envelope: Envelope<Value> = self
            .send(self.request(Method::GET, &format!("/config/{}", path)))
            .await?;
        Ok(envelope.data.get("value").cloned().unwrap_or(Value::Null))
    }

    pub async fn set_value(&self, path: &str, value: Value) -> Result<Envelope<Value>, ClientError> {
        self.send(
            self.request(Method::PUT, "/config")
                .json(&json!({ "path": path, "value": value })),
        )
        .await
    }

    pub async fn delete_value(&self, path: &str) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/config/{}", path)))
            .await
    }

    pub async fn add_service(&self, service: &Value) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/config/service").json(service))
            .await
    }

    pub async fn remove_service(&self, name: &str) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/config/service/{}", name)))
            .await
    }

    pub async fn add_outbound(&self, outbound: &Value) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/config/outbound").json(outbound))
            .await
    }

    pub async fn remove_outbound(&self, name: &str) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/config/outbound/{}", name)))
            .await
    }

    pub async fn tail(&self, file: &str, lines: Option<usize>) -> Result<LogTail, ClientError> {
        let mut builder = self.request(Method::GET, &format!("/logs/tail/{}", file));
        if let Some(n) = lines {
            builder = builder.query(&[("lines", n)]);
        }
        let envelope: Envelope<LogTail> = self.send(builder).await?;
        Ok(envelope.data)
    }

    pub async fn clear_logs(&self) -> Result<Envelope<Value>, ClientError> {
        self.send(self.request(Method::POST, "/logs/clear")).await
    }
}
