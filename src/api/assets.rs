//! UI entry point and static assets.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use include_dir::{include_dir, Dir};

use crate::api::{ApiState, HandlerError};
use crate::routing::{Route, RouteMethod};

static BUNDLE: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

const INDEX: &str = "index.html";

/// Where UI assets come from, chosen once at startup.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Files served from a directory on disk.
    Directory(PathBuf),
    /// Files compiled into the binary.
    Bundled(&'static Dir<'static>),
}

impl AssetSource {
    pub fn bundled() -> Self {
        AssetSource::Bundled(&BUNDLE)
    }

    /// A configured directory wins over the bundle.
    pub fn from_config(directory: Option<&Path>) -> Self {
        match directory {
            Some(dir) => {
                tracing::info!(directory = %dir.display(), "Serving UI assets from directory");
                AssetSource::Directory(dir.to_path_buf())
            }
            None => AssetSource::bundled(),
        }
    }

    pub async fn load(&self, path: &str) -> Result<Cow<'static, [u8]>, HandlerError> {
        let relative = sanitize(path).ok_or_else(|| HandlerError::AssetNotFound(path.to_string()))?;
        match self {
            AssetSource::Bundled(dir) => dir
                .get_file(&relative)
                .map(|f| Cow::Borrowed(f.contents()))
                .ok_or_else(|| HandlerError::AssetNotFound(path.to_string())),
            AssetSource::Directory(root) => {
                let file = root.join(&relative);
                match tokio::fs::metadata(&file).await {
                    Ok(meta) if meta.is_file() => Ok(Cow::Owned(tokio::fs::read(&file).await?)),
                    Ok(_) => Err(HandlerError::AssetNotFound(path.to_string())),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(HandlerError::AssetNotFound(path.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Relative path made only of normal components, or None.
fn sanitize(path: &str) -> Option<PathBuf> {
    let path = Path::new(path.trim_start_matches('/'));
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn content_type(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

async fn serve(assets: &AssetSource, path: &str) -> Result<Response, HandlerError> {
    let body = assets.load(path).await?;
    Ok(([(header::CONTENT_TYPE, content_type(path))], body).into_response())
}

async fn ui_index(State(state): State<ApiState>) -> Result<Response, HandlerError> {
    serve(&state.assets, INDEX).await
}

async fn static_asset(
    State(state): State<ApiState>,
    UrlPath(path): UrlPath<String>,
) -> Result<Response, HandlerError> {
    serve(&state.assets, &path).await
}

async fn root_redirect() -> Redirect {
    Redirect::to("/ui/")
}

/// Paths under `/ui/` are client-side routes of the single page app and all
/// get the index. Anything else outside the API groups is sent to `/ui/`.
pub(crate) fn routes() -> Vec<Route<ApiState>> {
    vec![
        Route::new("uiIndex", RouteMethod::Get, "/ui/", ui_index),
        Route::new("uiDeepLink", RouteMethod::Get, "/ui/{*rest}", ui_index),
        Route::new("staticAssets", RouteMethod::Get, "/static/{*path}", static_asset),
        Route::new("rootRedirect", RouteMethod::Any, "/", root_redirect),
        Route::new("uiRedirect", RouteMethod::Any, "/{*path}", root_redirect),
    ]
}
