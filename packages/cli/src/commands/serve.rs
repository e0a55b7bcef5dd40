//! Reference preview server.
//!
//! Every request builds a fresh session inside a blocking task: engine values
//! are `Rc`-based, so a session never crosses threads once created.

use crate::commands::render::{render_store_blocking, Rendered};
use crate::config;
use anyhow::{Context, Result};
use clap::Args;
use glimpse_common::{CommonError, MemoryProjectStore, PreviewConfig, ProjectStore, VirtualFileStore};
use glimpse_compiler_html::DocumentOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3030)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Store error: {0}")]
    Store(CommonError),

    #[error("Render failed: {0}")]
    Render(String),
}

impl warp::reject::Reject for ApiError {}

impl From<CommonError> for ApiError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::ProjectNotFound(id) => ApiError::NotFound(id),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::FileNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct FileWrite {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FileDelete {
    pub path: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn ProjectStore>,
    pub config: Arc<PreviewConfig>,
    pub options: Arc<DocumentOptions>,
}

impl ServerState {
    pub fn new(store: Arc<dyn ProjectStore>, config: PreviewConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            options: Arc::new(DocumentOptions::default()),
        }
    }
}

fn with_state(state: ServerState) -> impl Filter<Extract = (ServerState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// All server routes, with errors rendered as JSON
pub fn routes(state: ServerState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let preview = warp::path!("preview")
        .and(warp::post())
        .and(json_body::<PreviewRequest>())
        .and(with_state(state.clone()))
        .and_then(handle_preview);

    let put_file = warp::path!("projects" / String / "files")
        .and(warp::put())
        .and(json_body::<FileWrite>())
        .and(with_state(state.clone()))
        .and_then(handle_put_file);

    let delete_file = warp::path!("projects" / String / "files")
        .and(warp::delete())
        .and(json_body::<FileDelete>())
        .and(with_state(state.clone()))
        .and_then(handle_delete_file);

    let project_preview = warp::path!("projects" / String / "preview")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_project_preview);

    preview
        .or(put_file)
        .or(delete_file)
        .or(project_preview)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

async fn render(files: VirtualFileStore, state: &ServerState) -> Result<Rendered, ApiError> {
    let config = PreviewConfig::clone(&state.config);
    let options = Arc::clone(&state.options);
    tokio::task::spawn_blocking(move || render_store_blocking(files, config, &options))
        .await
        .map_err(|err| ApiError::Render(err.to_string()))?
        .map_err(|err| ApiError::Render(err.to_string()))
}

fn html_reply(rendered: Rendered) -> impl Reply {
    let reply = warp::reply::with_header(warp::reply::html(rendered.html), "x-glimpse-mounted", rendered.mounted.to_string());
    warp::reply::with_header(reply, "x-glimpse-problems", rendered.problems.len().to_string())
}

async fn handle_preview(request: PreviewRequest, state: ServerState) -> Result<impl Reply, Rejection> {
    debug!(files = request.files.len(), "preview request");
    let rendered = render(VirtualFileStore::new(request.files), &state).await?;
    Ok(html_reply(rendered))
}

async fn handle_put_file(project_id: String, body: FileWrite, state: ServerState) -> Result<impl Reply, Rejection> {
    state
        .store
        .put_file(&project_id, &body.path, &body.content)
        .map_err(ApiError::from)?;
    debug!(%project_id, path = %body.path, "file stored");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_delete_file(project_id: String, body: FileDelete, state: ServerState) -> Result<impl Reply, Rejection> {
    let existed = state
        .store
        .delete_file(&project_id, &body.path)
        .map_err(ApiError::from)?;
    if !existed {
        return Err(ApiError::FileNotFound(body.path).into());
    }
    debug!(%project_id, path = %body.path, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_project_preview(project_id: String, state: ServerState) -> Result<impl Reply, Rejection> {
    let files = state.store.get_files(&project_id).map_err(ApiError::from)?;
    let rendered = render(files, &state).await?;
    Ok(html_reply(rendered))
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(err) = rejection.find::<ApiError>() {
        if err.status().is_server_error() {
            error!(error = %err, "request failed");
        }
        (err.status(), err.to_string())
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    let body = warp::reply::json(&ErrorBody { error: message });
    Ok(warp::reply::with_status(body, status))
}

pub async fn serve(args: ServeArgs, cwd: &Path) -> Result<()> {
    let config = config::load(cwd).context("Failed to load preview config")?;
    let state = ServerState::new(Arc::new(MemoryProjectStore::new()), config);
    let addr = SocketAddr::new(args.host, args.port);

    info!(%addr, "preview server listening");
    println!("🚀 Server running at http://{}", addr);

    warp::serve(routes(state)).run(addr).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::test::request;

    fn state() -> ServerState {
        ServerState::new(Arc::new(MemoryProjectStore::new()), PreviewConfig::default())
    }

    #[tokio::test]
    async fn test_preview_request() {
        let api = routes(state());
        let response = request()
            .method("POST")
            .path("/preview")
            .json(&serde_json::json!({
                "files": { "src/App.tsx": "export default () => <h1>Served</h1>;" }
            }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-glimpse-mounted"], "true");
        let body = String::from_utf8_lossy(response.body());
        assert!(body.contains("Served"));
        assert!(body.contains("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let api = routes(state());

        let missing = request().method("GET").path("/projects/demo/preview").reply(&api).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let put = request()
            .method("PUT")
            .path("/projects/demo/files")
            .json(&serde_json::json!({
                "path": "src/App.tsx",
                "content": "export default () => <p>Stored project</p>;"
            }))
            .reply(&api)
            .await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);

        let preview = request().method("GET").path("/projects/demo/preview").reply(&api).await;
        assert_eq!(preview.status(), StatusCode::OK);
        assert!(String::from_utf8_lossy(preview.body()).contains("Stored project"));

        let delete = request()
            .method("DELETE")
            .path("/projects/demo/files")
            .json(&serde_json::json!({ "path": "src/App.tsx" }))
            .reply(&api)
            .await;
        assert_eq!(delete.status(), StatusCode::NO_CONTENT);

        let again = request()
            .method("DELETE")
            .path("/projects/demo/files")
            .json(&serde_json::json!({ "path": "src/App.tsx" }))
            .reply(&api)
            .await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_body() {
        let api = routes(state());
        let response = request()
            .method("POST")
            .path("/preview")
            .header("content-type", "application/json")
            .body("{ not json")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["error"].is_string());
    }
}
