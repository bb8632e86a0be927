//! HTTP surface for the corpus server.
//!
//! This module exposes a compact Axum router over the corpus service:
//!
//! - `POST /documents` – Multipart upload of one or more documents (optional
//!   `chunk_size` field); each is extracted, chunked, embedded, and indexed.
//! - `GET /documents` – List indexed sources with their chunk counts.
//! - `GET /documents/{name}` – Extracted plain text of a stored document.
//! - `DELETE /documents/{name}` – Remove a document's chunks and raw bytes.
//! - `POST /rechunk` – Rebuild the whole corpus at a new chunk size.
//! - `POST /search` – Nearest-chunk retrieval without generation.
//! - `POST /chat` – Retrieval-augmented completion: retrieve, assemble a
//!   grounding context, and call the generation provider.
//! - `GET /metrics` – Ingestion counters.
//!
//! Handlers are generic over [`CorpusApi`] so tests can drive the router with
//! a stub service.

use crate::config::get_config;
use crate::corpus::{CorpusApi, CorpusError, RetrievedChunk, SourceCount, build_context};
use crate::generation::{GenerationClient, GenerationClientError};
use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handler state: the corpus service plus the generation client.
pub struct AppState<S> {
    corpus: Arc<S>,
    generation: Arc<dyn GenerationClient>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            corpus: Arc::clone(&self.corpus),
            generation: Arc::clone(&self.generation),
        }
    }
}

/// Build the HTTP router exposing the corpus API surface.
pub fn create_router<S>(corpus: Arc<S>, generation: Arc<dyn GenerationClient>) -> Router
where
    S: CorpusApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            get(list_documents::<S>).post(upload_documents::<S>),
        )
        .route(
            "/documents/:name",
            get(get_document::<S>).delete(delete_document::<S>),
        )
        .route("/rechunk", post(rechunk::<S>))
        .route("/search", post(search::<S>))
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(AppState { corpus, generation })
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    /// Number of files accepted in this request.
    files: usize,
    /// Corpus size after the upload.
    total_chunks: usize,
}

/// Ingest every file part of a multipart upload.
///
/// Parts are collected first so a trailing `chunk_size` field still applies
/// to all files in the request. Documents are ingested in order and each one
/// is atomic; a failure on file N leaves files 1..N-1 indexed and aborts the
/// rest.
async fn upload_documents<S>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: CorpusApi,
{
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut chunk_size: Option<usize> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        if let Some(file_name) = field.file_name().map(ToString::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::BadRequest(err.to_string()))?;
            files.push((file_name, bytes.to_vec()));
        } else if field.name() == Some("chunk_size") {
            let value = field
                .text()
                .await
                .map_err(|err| AppError::BadRequest(err.to_string()))?;
            chunk_size = Some(
                value
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid chunk_size: {value}")))?,
            );
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("no file parts in upload".into()));
    }

    let file_count = files.len();
    let mut total_chunks = 0;
    for (file_name, bytes) in files {
        let outcome = state.corpus.ingest(&file_name, bytes, chunk_size).await?;
        total_chunks = outcome.total_chunks;
        tracing::info!(
            file = file_name,
            chunks = outcome.chunks_added,
            chunk_size = outcome.chunk_size,
            "Upload indexed"
        );
    }

    Ok(Json(UploadResponse {
        status: "uploaded",
        files: file_count,
        total_chunks,
    }))
}

/// List indexed sources and their chunk counts.
async fn list_documents<S>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<SourceCount>>, AppError>
where
    S: CorpusApi,
{
    Ok(Json(state.corpus.list_sources().await?))
}

/// Return the extracted text of a stored document.
async fn get_document<S>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> Result<Response, AppError>
where
    S: CorpusApi,
{
    match state.corpus.document_text(&name).await? {
        Some(text) => Ok(text.into_response()),
        None => Ok((StatusCode::NOT_FOUND, "File not found").into_response()),
    }
}

/// Success response for `DELETE /documents/{name}`.
#[derive(Serialize)]
struct DeleteResponse {
    status: &'static str,
    file: String,
}

/// Delete a document's chunks and stored bytes. Unknown documents succeed as
/// a no-op so the operation is idempotent.
async fn delete_document<S>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>, AppError>
where
    S: CorpusApi,
{
    state.corpus.delete_source(&name).await?;
    Ok(Json(DeleteResponse {
        status: "deleted",
        file: name,
    }))
}

/// Request body for `POST /rechunk`.
#[derive(Deserialize)]
struct RechunkRequest {
    /// Chunk size applied to every stored document.
    chunk_size: usize,
}

/// Response body for `POST /rechunk`.
#[derive(Serialize)]
struct RechunkResponse {
    total_chunks: usize,
}

/// Rebuild the corpus from stored documents at a new chunk size.
async fn rechunk<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<RechunkRequest>,
) -> Result<Json<RechunkResponse>, AppError>
where
    S: CorpusApi,
{
    let total_chunks = state.corpus.rebuild(request.chunk_size).await?;
    Ok(Json(RechunkResponse { total_chunks }))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    /// Free-text query to embed and match against the corpus.
    query: String,
    /// Optional result count (defaults to `RETRIEVAL_TOP_K`).
    #[serde(default)]
    top_k: Option<usize>,
}

/// Response body for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SourceAttribution>,
}

/// One retrieved chunk as exposed over HTTP.
#[derive(Serialize)]
struct SourceAttribution {
    /// Verbatim chunk text.
    chunk: String,
    /// Originating document.
    file: String,
    /// Position of the chunk in the corpus ordering.
    position: usize,
    /// Squared Euclidean distance from the query embedding.
    distance: f32,
}

impl From<RetrievedChunk> for SourceAttribution {
    fn from(hit: RetrievedChunk) -> Self {
        Self {
            chunk: hit.text,
            file: hit.source,
            position: hit.position,
            distance: hit.distance,
        }
    }
}

/// Nearest-chunk retrieval without a generation call.
async fn search<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: CorpusApi,
{
    let hits = state.corpus.query(&request.query, request.top_k).await?;
    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SourceAttribution::from).collect(),
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// User question to answer against the corpus.
    prompt: String,
    /// Optional generation model override (defaults to `GENERATION_MODEL`).
    #[serde(default)]
    model: Option<String>,
    /// Optional number of grounding chunks (defaults to `RETRIEVAL_TOP_K`).
    #[serde(default)]
    top_k: Option<usize>,
}

/// Response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    sources: Vec<SourceAttribution>,
}

/// Retrieval-augmented completion: embed the prompt, retrieve grounding
/// chunks, and hand the assembled context to the generation provider.
async fn chat<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: CorpusApi,
{
    let hits = state.corpus.query(&request.prompt, request.top_k).await?;
    let context = build_context(&hits);
    let prompt = format!(
        "Context:\n{context}\n\nQuestion: {question}\nAnswer:",
        question = request.prompt
    );
    let model = request
        .model
        .unwrap_or_else(|| get_config().generation_model.clone());

    let answer = state.generation.generate(&model, &prompt).await?;
    tracing::info!(
        model,
        grounding_chunks = hits.len(),
        "Chat request completed"
    );

    Ok(Json(ChatResponse {
        answer,
        sources: hits.into_iter().map(SourceAttribution::from).collect(),
    }))
}

/// Return ingestion counters for observability.
async fn get_metrics<S>(
    State(state): State<AppState<S>>,
) -> Json<crate::metrics::MetricsSnapshot>
where
    S: CorpusApi,
{
    Json(state.corpus.metrics_snapshot())
}

enum AppError {
    Corpus(CorpusError),
    Generation(GenerationClientError),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Corpus(
                error @ (CorpusError::Extraction(_) | CorpusError::Chunking(_)),
            ) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Corpus(error @ CorpusError::Embedding(_)) => {
                (StatusCode::BAD_GATEWAY, error.to_string())
            }
            Self::Corpus(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            Self::Generation(error) => (StatusCode::BAD_GATEWAY, error.to_string()),
        };
        (status, message).into_response()
    }
}

impl From<CorpusError> for AppError {
    fn from(inner: CorpusError) -> Self {
        Self::Corpus(inner)
    }
}

impl From<GenerationClientError> for AppError {
    fn from(inner: GenerationClientError) -> Self {
        Self::Generation(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::init_test_config;
    use crate::corpus::IngestOutcome;
    use crate::metrics::MetricsSnapshot;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary";

    fn multipart_body(files: &[(&str, &[u8])], chunk_size: Option<usize>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(size) = chunk_size {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chunk_size\"\r\n\r\n{size}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_route_ingests_each_file_with_chunk_size() {
        init_test_config();
        let service = Arc::new(StubCorpus::default());
        let app = create_router(service.clone(), Arc::new(StubGeneration::default()));

        let body = multipart_body(&[("a.txt", b"alpha"), ("b.txt", b"beta")], Some(250));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "uploaded");
        assert_eq!(json["files"], 2);

        let calls = service.ingest_calls.lock().await.clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("a.txt".to_string(), Some(250)));
        assert_eq!(calls[1], ("b.txt".to_string(), Some(250)));
    }

    #[tokio::test]
    async fn upload_without_files_is_a_bad_request() {
        init_test_config();
        let app = create_router(
            Arc::new(StubCorpus::default()),
            Arc::new(StubGeneration::default()),
        );

        let body = multipart_body(&[], Some(100));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_route_builds_context_and_reports_sources() {
        init_test_config();
        let service = Arc::new(StubCorpus::with_hits(vec![
            RetrievedChunk {
                text: "first chunk".into(),
                source: "doc.txt".into(),
                position: 0,
                distance: 0.0,
            },
            RetrievedChunk {
                text: "second chunk".into(),
                source: "doc.txt".into(),
                position: 1,
                distance: 0.5,
            },
        ]));
        let generation = Arc::new(StubGeneration::default());
        let app = create_router(service, generation.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "prompt": "why?", "top_k": 2 }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["answer"], "stub answer");
        assert_eq!(json["sources"].as_array().expect("sources").len(), 2);
        assert_eq!(json["sources"][0]["file"], "doc.txt");
        assert_eq!(json["sources"][0]["position"], 0);

        let (model, prompt) = generation.calls.lock().await[0].clone();
        assert_eq!(model, "test-gen");
        assert_eq!(
            prompt,
            "Context:\nfirst chunk\n\nsecond chunk\n\nQuestion: why?\nAnswer:"
        );
    }

    #[tokio::test]
    async fn search_route_returns_ranked_results() {
        init_test_config();
        let service = Arc::new(StubCorpus::with_hits(vec![RetrievedChunk {
            text: "only".into(),
            source: "a.txt".into(),
            position: 3,
            distance: 1.25,
        }]));
        let app = create_router(service, Arc::new(StubGeneration::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "query": "only" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["results"][0]["chunk"], "only");
        assert_eq!(json["results"][0]["position"], 3);
        assert_eq!(json["results"][0]["distance"], 1.25);
    }

    #[tokio::test]
    async fn document_routes_cover_listing_fetching_and_deletion() {
        init_test_config();
        let service = Arc::new(StubCorpus::default());
        let app = create_router(service.clone(), Arc::new(StubGeneration::default()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/documents")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("list response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json[0]["file"], "doc.txt");
        assert_eq!(json[0]["chunks"], 3);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/documents/doc.txt")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("get response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/documents/missing.txt")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("get response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/documents/doc.txt")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("delete response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "deleted");
        assert_eq!(json["file"], "doc.txt");
        assert_eq!(service.deleted.lock().await.as_slice(), ["doc.txt"]);
    }

    #[tokio::test]
    async fn rechunk_route_triggers_rebuild() {
        init_test_config();
        let service = Arc::new(StubCorpus::default());
        let app = create_router(service.clone(), Arc::new(StubGeneration::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/rechunk")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "chunk_size": 300 }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["total_chunks"], 7);
        assert_eq!(*service.rebuilt_with.lock().await, Some(300));
    }

    #[derive(Default)]
    struct StubCorpus {
        ingest_calls: Mutex<Vec<(String, Option<usize>)>>,
        deleted: Mutex<Vec<String>>,
        rebuilt_with: Mutex<Option<usize>>,
        hits: Vec<RetrievedChunk>,
    }

    impl StubCorpus {
        fn with_hits(hits: Vec<RetrievedChunk>) -> Self {
            Self {
                hits,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl CorpusApi for StubCorpus {
        async fn ingest(
            &self,
            file_name: &str,
            _bytes: Vec<u8>,
            chunk_size: Option<usize>,
        ) -> Result<IngestOutcome, CorpusError> {
            self.ingest_calls
                .lock()
                .await
                .push((file_name.to_string(), chunk_size));
            Ok(IngestOutcome {
                chunks_added: 1,
                chunk_size: chunk_size.unwrap_or(500),
                total_chunks: self.ingest_calls.lock().await.len(),
            })
        }

        async fn delete_source(&self, file_name: &str) -> Result<(), CorpusError> {
            self.deleted.lock().await.push(file_name.to_string());
            Ok(())
        }

        async fn rebuild(&self, chunk_size: usize) -> Result<usize, CorpusError> {
            *self.rebuilt_with.lock().await = Some(chunk_size);
            Ok(7)
        }

        async fn query(
            &self,
            _query_text: &str,
            _top_k: Option<usize>,
        ) -> Result<Vec<RetrievedChunk>, CorpusError> {
            Ok(self.hits.clone())
        }

        async fn list_sources(&self) -> Result<Vec<SourceCount>, CorpusError> {
            Ok(vec![SourceCount {
                file: "doc.txt".into(),
                chunks: 3,
            }])
        }

        async fn document_text(&self, file_name: &str) -> Result<Option<String>, CorpusError> {
            Ok((file_name == "doc.txt").then(|| "document body".to_string()))
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_indexed: 0,
                chunks_indexed: 0,
                last_chunk_size: None,
            }
        }
    }

    #[derive(Default)]
    struct StubGeneration {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl GenerationClient for StubGeneration {
        async fn generate(
            &self,
            model: &str,
            prompt: &str,
        ) -> Result<String, GenerationClientError> {
            self.calls
                .lock()
                .await
                .push((model.to_string(), prompt.to_string()));
            Ok("stub answer".into())
        }
    }
}
