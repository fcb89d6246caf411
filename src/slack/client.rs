use crate::config::SlackConfig;
use crate::slack::types::{ChatMessage, FileUpload, UploadedFile, UploadedFileInfo};
use crate::slack::ChatApi;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum SlackError {
    #[error("Slack request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Slack {method} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        status: u16,
        body: String,
    },

    #[error("Slack {method} failed: {error}")]
    Api { method: &'static str, error: String },

    #[error("Failed to read report file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Slack bot token is not configured")]
    MissingToken,
}

#[derive(Deserialize)]
struct UploadUrlResponse {
    upload_url: String,
    file_id: String,
}

#[derive(Deserialize)]
struct CompletedFile {
    id: String,
    #[serde(default)]
    url_private: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct CompleteUploadResponse {
    #[serde(default)]
    files: Vec<CompletedFile>,
}

#[derive(Deserialize)]
struct FileInfoResponse {
    file: UploadedFileInfo,
}

#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    bot_token: String,
    api_base: String,
    upload_channels: Vec<String>,
}

impl SlackClient {
    pub fn new(bot_token: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_channels: Vec::new(),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackError> {
        let token = config.bot_token.trim();
        if token.is_empty() || token.starts_with('$') {
            return Err(SlackError::MissingToken);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            bot_token: token.to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_channels: config.upload_channels.clone(),
        })
    }

    pub fn with_upload_channels(mut self, channels: Vec<String>) -> Self {
        self.upload_channels = channels;
        self
    }

    /// Post a message to the interaction's `response_url`.
    pub async fn send_response(&self, message: &ChatMessage) -> Result<(), SlackError> {
        let resp = self
            .client
            .post(&message.response_url)
            .json(message)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            error!("Slack response_url error {}: {}", status, body);
            return Err(SlackError::Status {
                method: "response_url",
                status,
                body,
            });
        }
        Ok(())
    }

    /// Send a Web API request and unwrap Slack's `{ok, error}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> Result<T, SlackError> {
        let resp = request.bearer_auth(&self.bot_token).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            return Err(SlackError::Status {
                method,
                status,
                body,
            });
        }

        let body: Value = resp.json().await?;
        if !body["ok"].as_bool().unwrap_or(false) {
            return Err(SlackError::Api {
                method,
                error: body["error"].as_str().unwrap_or("unknown error").to_string(),
            });
        }

        serde_json::from_value(body).map_err(|e| SlackError::Api {
            method,
            error: format!("unexpected response: {}", e),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Upload a report file with Slack's external upload flow:
    /// reserve an upload URL, send the bytes, then complete and share.
    pub async fn upload_external(&self, upload: &FileUpload) -> Result<UploadedFile, SlackError> {
        let bytes = tokio::fs::read(&upload.file_path)
            .await
            .map_err(|source| SlackError::File {
                path: upload.file_path.clone(),
                source,
            })?;
        let mime = mime_guess::from_path(&upload.file_path).first_or_octet_stream();
        debug!(
            "Uploading {} ({} bytes, {}, filetype {})",
            upload.file_path.display(),
            bytes.len(),
            mime,
            upload.file_type
        );

        let reserved: UploadUrlResponse = self
            .call(
                "files.getUploadURLExternal",
                self.client
                    .post(self.api_url("files.getUploadURLExternal"))
                    .form(&[
                        ("filename", upload.file_tmp_name.clone()),
                        ("length", bytes.len().to_string()),
                    ]),
            )
            .await?;

        let part = Part::bytes(bytes)
            .file_name(upload.file_tmp_name.clone())
            .mime_str(mime.as_ref())?;
        let resp = self
            .client
            .post(&reserved.upload_url)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            error!("Slack upload URL rejected {}: {}", upload.file_tmp_name, body);
            return Err(SlackError::Status {
                method: "upload_url",
                status,
                body,
            });
        }

        let files = json!([{ "id": reserved.file_id, "title": upload.file_name }]).to_string();
        let mut form = vec![("files", files)];
        if !self.upload_channels.is_empty() {
            form.push(("channels", self.upload_channels.join(",")));
        }
        let completed: CompleteUploadResponse = self
            .call(
                "files.completeUploadExternal",
                self.client
                    .post(self.api_url("files.completeUploadExternal"))
                    .form(&form),
            )
            .await?;

        let file = completed
            .files
            .into_iter()
            .find(|f| f.id == reserved.file_id)
            .ok_or_else(|| SlackError::Api {
                method: "files.completeUploadExternal",
                error: "response missing file".to_string(),
            })?;

        match file.url_private {
            Some(url_private) => Ok(UploadedFile {
                file: UploadedFileInfo {
                    id: Some(file.id),
                    url_private,
                    permalink: file.permalink,
                },
            }),
            // Completion may return only id and title
            None => self.file_info(&file.id).await,
        }
    }

    pub async fn file_info(&self, file_id: &str) -> Result<UploadedFile, SlackError> {
        let info: FileInfoResponse = self
            .call(
                "files.info",
                self.client
                    .get(self.api_url("files.info"))
                    .query(&[("file", file_id)]),
            )
            .await?;
        Ok(UploadedFile { file: info.file })
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(&self, message: &ChatMessage) -> anyhow::Result<()> {
        Ok(self.send_response(message).await?)
    }

    async fn upload_file(&self, upload: &FileUpload) -> anyhow::Result<UploadedFile> {
        Ok(self.upload_external(upload).await?)
    }
}
