//! Generation backend interface.
//!
//! [`Backend`] is the seam between stage orchestration and the remote
//! service; [`HttpBackend`] is the reqwest implementation used by the app.

pub mod http;
pub mod stream;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::state::ChatMessage;
use crate::types::{
    ArtifactLength, ArtifactLevel, BriefInstructions, Configuration, ConnectConfiguration,
    SourceDocument,
};
use crate::upload::UploadFile;

pub use http::HttpBackend;
pub use stream::{accumulate, ChunkKind, StreamChunk, StreamOutcome};

/// Incremental chunks of a streamed refinement response
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, BackendError>>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn parse_files(&self, files: &[UploadFile]) -> Result<Vec<SourceDocument>, BackendError>;

    async fn generate_outline(
        &self,
        request: &OutlineRequest,
    ) -> Result<GenerationResponse, BackendError>;

    async fn extract_brief_instructions(
        &self,
        request: &ExtractInstructionsRequest,
    ) -> Result<Vec<BriefInstructions>, BackendError>;

    async fn generate_brief(
        &self,
        request: &BriefRequest,
    ) -> Result<GenerationResponse, BackendError>;

    async fn generate_connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<GenerationResponse, BackendError>;

    async fn generate_test(
        &self,
        request: &TestRequest,
    ) -> Result<GenerationResponse, BackendError>;

    async fn generate_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<GenerationResponse, BackendError>;

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError>;

    async fn adjust_length(
        &self,
        request: &AdjustLengthRequest,
    ) -> Result<ChunkStream, BackendError>;

    async fn adjust_level(&self, request: &AdjustLevelRequest) -> Result<ChunkStream, BackendError>;

    async fn update_selection(
        &self,
        request: &UpdateSelectionRequest,
    ) -> Result<ChunkStream, BackendError>;

    /// Render markdown into a downloadable document
    async fn export_artifact(&self, content: &str) -> Result<Vec<u8>, BackendError>;

    /// Convert an uploaded document back into markdown
    async fn import_artifact(&self, file: &UploadFile) -> Result<String, BackendError>;
}

// ============================================================================
// Generation requests
// ============================================================================

/// Configuration as the generation endpoints expect it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendConfig {
    pub title: String,
    pub tone: String,
    pub brief_count: String,
    pub sections_to_highlight: String,
    pub sections_to_exclude: String,
}

impl From<&Configuration> for BackendConfig {
    fn from(config: &Configuration) -> Self {
        Self {
            title: config.title.clone(),
            tone: config.tone.as_str().to_string(),
            brief_count: config.number_of_briefs.as_str().to_string(),
            sections_to_highlight: config.sections_to_highlight.clone().unwrap_or_default(),
            sections_to_exclude: config.sections_to_exclude.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineRequest {
    pub source: Vec<SourceDocument>,
    pub config: BackendConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPayload {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractInstructionsRequest {
    pub config: BackendConfig,
    pub outline_artifact: ArtifactPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractInstructionsResponse {
    pub briefs: Vec<BriefInstructions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BriefRequest {
    pub source: Vec<SourceDocument>,
    pub brief_instructions: BriefInstructions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub source: Vec<SourceDocument>,
    pub config: BackendConfig,
    pub connect_config: ConnectConfiguration,
    pub briefs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRequest {
    pub source: Vec<SourceDocument>,
    pub config: BackendConfig,
    pub briefs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub source: Vec<SourceDocument>,
    pub config: BackendConfig,
    pub outline: String,
    pub briefs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseText {
    pub content: String,
}

/// Body returned by every non-streaming generation endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    #[serde(default)]
    pub response: Option<ResponseText>,
}

impl GenerationResponse {
    /// Narrative text accompanying the artifact, if any
    pub fn message(&self) -> Option<&str> {
        self.response
            .as_ref()
            .map(|r| r.content.trim())
            .filter(|m| !m.is_empty())
    }
}

// ============================================================================
// Refinement requests (streamed)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub artifact: String,
    pub source: Vec<SourceDocument>,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brief_instructions: Option<BriefInstructions>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustLengthRequest {
    pub new_length: ArtifactLength,
    pub messages: Vec<ChatMessage>,
    pub artifact: String,
    pub source: Vec<SourceDocument>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustLevelRequest {
    pub new_level: ArtifactLevel,
    pub messages: Vec<ChatMessage>,
    pub artifact: String,
    pub source: Vec<SourceDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactChunk {
    pub block: String,
    pub selection: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSelectionRequest {
    pub query: String,
    pub artifact_chunk: ArtifactChunk,
    pub source: Vec<SourceDocument>,
    pub messages: Vec<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BriefCount, Tone};

    #[test]
    fn test_backend_config_wire_shape() {
        let config = Configuration {
            title: "Stress testing".to_string(),
            tone: Tone::TechnicalAndAnalytical,
            number_of_briefs: BriefCount::Two,
            sections_to_highlight: Some("Chapter 2".to_string()),
            sections_to_exclude: None,
        };
        let json = serde_json::to_value(BackendConfig::from(&config)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Stress testing",
                "tone": "technical_and_analytical",
                "brief_count": "two",
                "sections_to_highlight": "Chapter 2",
                "sections_to_exclude": "",
            })
        );
    }

    #[test]
    fn test_refine_requests_use_camel_case() {
        let request = AdjustLevelRequest {
            new_level: ArtifactLevel::Advanced,
            messages: vec![],
            artifact: "text".to_string(),
            source: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["newLevel"], "Advanced");

        let request = UpdateSelectionRequest {
            query: "simplify".to_string(),
            artifact_chunk: ArtifactChunk {
                block: "para".to_string(),
                selection: "word".to_string(),
            },
            source: vec![],
            messages: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["artifactChunk"]["selection"], "word");
    }

    #[test]
    fn test_generation_response_message() {
        let body: GenerationResponse =
            serde_json::from_str(r##"{"content":"# Outline","response":{"content":" Done "}}"##)
                .unwrap();
        assert_eq!(body.message(), Some("Done"));

        let body: GenerationResponse = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert_eq!(body.message(), None);
    }
}
