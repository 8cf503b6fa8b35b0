use aicademy_core::backend::{
    accumulate, AdjustLengthRequest, AdjustLevelRequest, ArtifactChunk, ArtifactPayload, Backend,
    BackendConfig, BriefRequest, ChatRequest, ExtractInstructionsRequest, OutlineRequest,
    UpdateSelectionRequest,
};
use aicademy_core::{
    ArtifactLength, ArtifactLevel, BackendError, BriefInstructions, Configuration, HttpBackend, SourceDocument,
    UploadFile,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source() -> SourceDocument {
    SourceDocument {
        name: Some("basel.pdf".to_string()),
        file_type: Some("pdf".to_string()),
        content: "Capital buffers absorb losses.".to_string(),
        figures: vec![],
    }
}

fn config() -> BackendConfig {
    BackendConfig::from(&Configuration {
        title: "Capital Adequacy".to_string(),
        ..Default::default()
    })
}

fn sse(events: &[&str]) -> String {
    events
        .iter()
        .map(|e| format!("data: {}\n\n", e))
        .collect::<String>()
}

#[tokio::test]
async fn test_generate_outline_posts_source_and_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/outline/generate"))
        .and(body_partial_json(serde_json::json!({
            "config": { "title": "Capital Adequacy", "brief_count": "three" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": "# Outline\n\n1. Buffers",
            "response": { "content": "Here is your outline." }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let response = backend
        .generate_outline(&OutlineRequest {
            source: vec![source()],
            config: config(),
        })
        .await
        .unwrap();

    assert_eq!(response.content, "# Outline\n\n1. Buffers");
    assert_eq!(response.message(), Some("Here is your outline."));
}

#[tokio::test]
async fn test_extract_instructions_unwraps_briefs() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/brief/extract-instructions"))
        .and(body_partial_json(serde_json::json!({
            "outline_artifact": { "content": "1. Buffers\n2. Leverage" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "briefs": [
                { "title": "Buffers", "objectives": "Explain buffers" },
                { "title": "Leverage", "section_title": "Chapter 2" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&format!("{}/", mock_server.uri()));
    let briefs = backend
        .extract_brief_instructions(&ExtractInstructionsRequest {
            config: config(),
            outline_artifact: ArtifactPayload {
                content: "1. Buffers\n2. Leverage".to_string(),
            },
        })
        .await
        .unwrap();

    assert_eq!(briefs.len(), 2);
    assert_eq!(briefs[0].objectives, "Explain buffers");
    assert_eq!(briefs[1].section_title.as_deref(), Some("Chapter 2"));
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/brief/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let err = backend
        .generate_brief(&BriefRequest {
            source: vec![source()],
            brief_instructions: BriefInstructions {
                title: "Buffers".to_string(),
                ..Default::default()
            },
        })
        .await
        .unwrap_err();

    match err {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_stream_is_accumulated() {
    let mock_server = MockServer::start().await;

    let body = sse(&[
        r#"{"type":"progress","content":"Reading sources"}"#,
        r#"{"type":"response","content":"Tightened the "}"#,
        r#"{"type":"response","content":"introduction."}"#,
        r##"{"type":"artifact","content":"# Outline v2"}"##,
        "[DONE]",
        r#"{"type":"artifact","content":"after done"}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/api/chat/completion"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(serde_json::json!({ "stage": "outline" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let stream = backend
        .chat_completion(&ChatRequest {
            messages: vec![],
            artifact: "# Outline".to_string(),
            source: vec![source()],
            stage: "outline".to_string(),
            config: None,
            brief_instructions: None,
        })
        .await
        .unwrap();

    let mut progress = Vec::new();
    let outcome = accumulate(stream, |p| progress.push(p.to_string()))
        .await
        .unwrap();

    assert_eq!(outcome.response, "Tightened the introduction.");
    assert_eq!(outcome.artifact.as_deref(), Some("# Outline v2"));
    assert_eq!(progress, vec!["Reading sources"]);
}

#[tokio::test]
async fn test_adjust_level_sends_camel_case_level() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/refine/adjust-level"))
        .and(body_partial_json(serde_json::json!({ "newLevel": "Beginner" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                sse(&[r#"{"type":"artifact","content":"simpler"}"#]),
                "text/event-stream",
            ),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let stream = backend
        .adjust_level(&AdjustLevelRequest {
            new_level: ArtifactLevel::Beginner,
            messages: vec![],
            artifact: "dense".to_string(),
            source: vec![],
        })
        .await
        .unwrap();
    let outcome = accumulate(stream, |_| {}).await.unwrap();

    assert_eq!(outcome.artifact.as_deref(), Some("simpler"));
}

#[tokio::test]
async fn test_adjust_length_sends_new_length() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/refine/adjust-length"))
        .and(body_partial_json(serde_json::json!({
            "newLength": "shortest",
            "artifact": "Q1\nQ2\nQ3"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                sse(&[
                    r#"{"type":"progress","content":"Trimming"}"#,
                    r#"{"type":"artifact","content":"Q1"}"#,
                ]),
                "text/event-stream",
            ),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let stream = backend
        .adjust_length(&AdjustLengthRequest {
            new_length: ArtifactLength::Shortest,
            messages: vec![],
            artifact: "Q1\nQ2\nQ3".to_string(),
            source: vec![source()],
        })
        .await
        .unwrap();
    let outcome = accumulate(stream, |_| {}).await.unwrap();

    assert_eq!(outcome.artifact.as_deref(), Some("Q1"));
}

#[tokio::test]
async fn test_update_selection_sends_query_and_chunk() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/refine/update-selection"))
        .and(body_partial_json(serde_json::json!({
            "query": "use plainer words",
            "artifactChunk": {
                "block": "Buffers absorb losses.",
                "selection": "absorb"
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                sse(&[
                    r#"{"type":"block","content":"Buffers soak up losses."}"#,
                    r#"{"type":"response","content":"Reworded."}"#,
                    "[DONE]",
                ]),
                "text/event-stream",
            ),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let stream = backend
        .update_selection(&UpdateSelectionRequest {
            query: "use plainer words".to_string(),
            artifact_chunk: ArtifactChunk {
                block: "Buffers absorb losses.".to_string(),
                selection: "absorb".to_string(),
            },
            source: vec![],
            messages: vec![],
        })
        .await
        .unwrap();
    let outcome = accumulate(stream, |_| {}).await.unwrap();

    assert_eq!(outcome.block.as_deref(), Some("Buffers soak up losses."));
    assert_eq!(outcome.response, "Reworded.");
    assert!(outcome.artifact.is_none());
}

#[tokio::test]
async fn test_import_artifact_uploads_file_and_returns_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/io/import-artifact"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": "# Imported outline"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let content = backend
        .import_artifact(&UploadFile::new("outline.docx", b"PK\x03\x04".to_vec()))
        .await
        .unwrap();

    assert_eq!(content, "# Imported outline");

    let requests = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("outline.docx"));
}

#[tokio::test]
async fn test_parse_files_uploads_multipart() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/io/parse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "basel.pdf", "fileType": "pdf", "content": "Capital", "figures": [] }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let parsed = backend
        .parse_files(&[UploadFile::new("basel.pdf", b"%PDF-1.7".to_vec())])
        .await
        .unwrap();

    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].content, "Capital");

    let requests = mock_server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
}

#[tokio::test]
async fn test_export_returns_raw_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/io/export-artifact"))
        .and(body_partial_json(serde_json::json!({ "content": "# Brief 1" })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04docx".to_vec()))
        .mount(&mock_server)
        .await;

    let backend = HttpBackend::new(&mock_server.uri());
    let bytes = backend.export_artifact("# Brief 1").await.unwrap();

    assert_eq!(bytes, b"PK\x03\x04docx".to_vec());
}
