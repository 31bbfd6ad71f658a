//! Static file responder for the browser front end.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_ASSET_ROOT: &str = "public";
const INDEX_FILE: &str = "index.html";

/// Result of looking up a request path under the asset root.
#[derive(Debug)]
pub struct AssetReply {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl AssetReply {
    fn found(path: &Path, body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(content_type_for(path)),
            body,
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            content_type: None,
            body: b"404: File Not Found".to_vec(),
        }
    }

    fn server_error(kind: ErrorKind) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: None,
            body: format!("Server Error: {:?}", kind).into_bytes(),
        }
    }
}

impl IntoResponse for AssetReply {
    fn into_response(self) -> Response {
        match self.content_type {
            Some(content_type) => {
                (self.status, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
            }
            None => (self.status, self.body).into_response(),
        }
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpg",
        _ => "application/octet-stream",
    }
}

/// Maps a request path onto a file under `root`.
///
/// Returns None for anything that would escape the root.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.is_empty() {
        return Some(root.join(INDEX_FILE));
    }

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    Some(resolved)
}

pub async fn load(root: &Path, request_path: &str) -> AssetReply {
    let Some(path) = resolve(root, request_path) else {
        debug!("Refusing asset path {}", request_path);
        return AssetReply::not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(body) => AssetReply::found(&path, body),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Asset not found: {}", path.display());
            AssetReply::not_found()
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            AssetReply::server_error(e.kind())
        }
    }
}
