use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::stream::chunk_stream;
use super::{
    AdjustLengthRequest, AdjustLevelRequest, ArtifactPayload, Backend, BriefRequest, ChatRequest,
    ChunkStream, ConnectRequest, ExtractInstructionsRequest, ExtractInstructionsResponse,
    GenerationResponse, OutlineRequest, SummaryRequest, TestRequest, UpdateSelectionRequest,
};
use crate::error::BackendError;
use crate::types::{BriefInstructions, SourceDocument};
use crate::upload::UploadFile;

#[derive(serde::Deserialize)]
struct ImportResponse {
    content: String,
}

/// Talks to the generation service over HTTP; streaming routes use SSE
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");

        let response = self.client.post(&url).json(body).send().await?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_stream<B>(&self, path: &str, body: &B) -> Result<ChunkStream, BackendError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        debug!(%url, "POST (stream)");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(chunk_stream(response))
    }

    async fn post_multipart<R>(&self, path: &str, form: Form) -> Result<R, BackendError>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST (multipart)");

        let response = self.client.post(&url).multipart(form).send().await?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), %body, "backend request failed");
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

fn file_part(file: &UploadFile) -> Result<Part, BackendError> {
    let mime = if file.name.to_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    Ok(Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(mime)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn parse_files(&self, files: &[UploadFile]) -> Result<Vec<SourceDocument>, BackendError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("file", file_part(file)?);
        }
        self.post_multipart("/io/parse", form).await
    }

    async fn generate_outline(
        &self,
        request: &OutlineRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.post_json("/outline/generate", request).await
    }

    async fn extract_brief_instructions(
        &self,
        request: &ExtractInstructionsRequest,
    ) -> Result<Vec<BriefInstructions>, BackendError> {
        let body: ExtractInstructionsResponse =
            self.post_json("/brief/extract-instructions", request).await?;
        Ok(body.briefs)
    }

    async fn generate_brief(
        &self,
        request: &BriefRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.post_json("/brief/generate", request).await
    }

    async fn generate_connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.post_json("/connect/generate-connect", request).await
    }

    async fn generate_test(
        &self,
        request: &TestRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.post_json("/testyourself/generate-test", request).await
    }

    async fn generate_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.post_json("/exsum/generate-exsum", request).await
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError> {
        self.post_stream("/chat/completion", request).await
    }

    async fn adjust_length(
        &self,
        request: &AdjustLengthRequest,
    ) -> Result<ChunkStream, BackendError> {
        self.post_stream("/refine/adjust-length", request).await
    }

    async fn adjust_level(
        &self,
        request: &AdjustLevelRequest,
    ) -> Result<ChunkStream, BackendError> {
        self.post_stream("/refine/adjust-level", request).await
    }

    async fn update_selection(
        &self,
        request: &UpdateSelectionRequest,
    ) -> Result<ChunkStream, BackendError> {
        self.post_stream("/refine/update-selection", request).await
    }

    async fn export_artifact(&self, content: &str) -> Result<Vec<u8>, BackendError> {
        let url = self.url("/io/export-artifact");
        debug!(%url, "POST (export)");

        let payload = ArtifactPayload {
            content: content.to_string(),
        };
        let response = self.client.post(&url).json(&payload).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn import_artifact(&self, file: &UploadFile) -> Result<String, BackendError> {
        let form = Form::new().part("file", file_part(file)?);
        let body: ImportResponse = self.post_multipart("/io/import-artifact", form).await?;
        Ok(body.content)
    }
}
