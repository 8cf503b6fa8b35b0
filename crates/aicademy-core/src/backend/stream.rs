//! Server-sent event decoding for the refinement endpoints.

use std::fmt;

use eventsource_stream::Eventsource;
use futures_util::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ChunkStream;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Response,
    Artifact,
    Block,
    Progress,
    #[serde(other)]
    Unknown,
}

/// One event payload from a streaming endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    #[serde(default)]
    pub content: String,
}

impl StreamChunk {
    pub fn new(kind: ChunkKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Decode a data payload; bare text is treated as narrative
fn decode_chunk(payload: &str) -> StreamChunk {
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk,
        Err(_) => {
            debug!(payload, "non-JSON stream payload, treating as response text");
            StreamChunk::new(ChunkKind::Response, payload)
        }
    }
}

/// Turn a streaming HTTP response into a finite stream of chunks.
///
/// Ends on `data: [DONE]` or when the body closes.
pub fn chunk_stream(response: reqwest::Response) -> ChunkStream {
    decode_events(response.bytes_stream())
}

fn decode_events<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    body.eventsource()
        .take_while(|event| {
            let done = matches!(event, Ok(event) if event.data.trim() == "[DONE]");
            future::ready(!done)
        })
        .map(|event| match event {
            Ok(event) => Ok(decode_chunk(&event.data)),
            Err(e) => Err(BackendError::Stream(e.to_string())),
        })
        .boxed()
}

/// What a refinement stream produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Concatenated `response` chunks
    pub response: String,
    /// Latest `artifact` chunk
    pub artifact: Option<String>,
    /// Latest `block` chunk
    pub block: Option<String>,
}

/// Drain `stream`, folding chunks into a [`StreamOutcome`].
///
/// `on_progress` sees each `progress` chunk as it arrives.
pub async fn accumulate(
    mut stream: ChunkStream,
    mut on_progress: impl FnMut(&str) + Send,
) -> Result<StreamOutcome, BackendError> {
    let mut outcome = StreamOutcome::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        match chunk.kind {
            ChunkKind::Response => outcome.response.push_str(&chunk.content),
            ChunkKind::Artifact => outcome.artifact = Some(chunk.content),
            ChunkKind::Block => outcome.block = Some(chunk.content),
            ChunkKind::Progress => on_progress(&chunk.content),
            ChunkKind::Unknown => debug!(content = %chunk.content, "ignoring unknown chunk"),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    type Body = Vec<Result<Vec<u8>, std::io::Error>>;

    async fn decode(parts: &[&str]) -> Vec<StreamChunk> {
        let body: Body = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        decode_events(stream::iter(body))
            .map(|chunk| chunk.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_events_split_across_reads() {
        let chunks = decode(&[
            "data: {\"type\":\"resp",
            "onse\",\"content\":\"hi\"}\n",
            "\ndata: {\"type\":\"artifact\",\"content\":\"v2\"}\n\n",
        ])
        .await;

        assert_eq!(
            chunks,
            vec![
                StreamChunk::new(ChunkKind::Response, "hi"),
                StreamChunk::new(ChunkKind::Artifact, "v2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_done_ends_the_stream() {
        let chunks = decode(&[
            "event: message\r\ndata: x\r\n\r\n",
            "data: [DONE]\r\n\r\n",
            "data: late\n\n",
        ])
        .await;

        assert_eq!(chunks, vec![StreamChunk::new(ChunkKind::Response, "x")]);
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_as_stream_error() {
        let body: Body = vec![
            Ok(b"data: partial\n\n".to_vec()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        ];
        let result = accumulate(decode_events(stream::iter(body)), |_| {}).await;
        assert!(matches!(result, Err(BackendError::Stream(_))));
    }

    #[test]
    fn test_decode_chunk_falls_back_to_text() {
        assert_eq!(
            decode_chunk(r#"{"type":"artifact","content":"v2"}"#),
            StreamChunk::new(ChunkKind::Artifact, "v2")
        );
        assert_eq!(
            decode_chunk("plain words"),
            StreamChunk::new(ChunkKind::Response, "plain words")
        );
        assert_eq!(decode_chunk(r#"{"type":"other"}"#).kind, ChunkKind::Unknown);
    }

    #[tokio::test]
    async fn test_accumulate_collects_response_and_latest_artifact() {
        let chunks: Vec<Result<StreamChunk, BackendError>> = vec![
            Ok(StreamChunk::new(ChunkKind::Progress, "thinking")),
            Ok(StreamChunk::new(ChunkKind::Response, "Made it ")),
            Ok(StreamChunk::new(ChunkKind::Artifact, "draft")),
            Ok(StreamChunk::new(ChunkKind::Response, "shorter.")),
            Ok(StreamChunk::new(ChunkKind::Artifact, "final")),
        ];
        let mut progress = Vec::new();
        let outcome = accumulate(stream::iter(chunks).boxed(), |p| progress.push(p.to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.response, "Made it shorter.");
        assert_eq!(outcome.artifact.as_deref(), Some("final"));
        assert!(outcome.block.is_none());
        assert_eq!(progress, vec!["thinking"]);
    }

    #[tokio::test]
    async fn test_accumulate_propagates_stream_error() {
        let chunks: Vec<Result<StreamChunk, BackendError>> = vec![
            Ok(StreamChunk::new(ChunkKind::Response, "partial")),
            Err(BackendError::Stream("connection reset".to_string())),
        ];
        let result = accumulate(stream::iter(chunks).boxed(), |_| {}).await;
        assert!(matches!(result, Err(BackendError::Stream(_))));
    }
}
