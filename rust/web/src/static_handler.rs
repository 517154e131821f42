use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
use mime_guess::{mime, MimeGuess};
use tokio::fs;
use warp::http::{header, header::HeaderValue, Response, StatusCode};
use warp::hyper::Body;

pub const NOT_FOUND_MESSAGE: &str = "Error 404: The page not found";

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>404</title></head>\n\
<body><h1>Error 404</h1><p>The page not found</p></body>\n</html>\n";

#[derive(Debug, thiserror::Error)]
pub enum StaticError {
    #[error("asset not found")]
    NotFound,
    #[error("asset io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoErrorResponse for StaticError {
    fn status_code(&self) -> StatusCode {
        match self {
            StaticError::NotFound => StatusCode::NOT_FOUND,
            StaticError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            StaticError::NotFound => "static_not_found",
            StaticError::Io(_) => "static_io_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            StaticError::NotFound => ErrorSeverity::Client,
            StaticError::Io(_) => ErrorSeverity::Server,
        }
    }
}

/// Representation chosen for a 404 from the request's `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundFormat {
    Html,
    Json,
    Text,
}

impl NotFoundFormat {
    /// HTML wins when acceptable at all, then JSON, then plain text.
    /// A missing header accepts anything.
    pub fn negotiate(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return NotFoundFormat::Html;
        };

        let media_types: Vec<&str> = accept
            .split(',')
            .filter_map(|part| part.split(';').next())
            .map(str::trim)
            .collect();

        let accepts = |wanted: &[&str]| media_types.iter().any(|t| wanted.contains(t));

        if accepts(&["text/html", "text/*", "*/*"]) {
            NotFoundFormat::Html
        } else if accepts(&["application/json", "application/*"]) {
            NotFoundFormat::Json
        } else {
            NotFoundFormat::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticHandler {
    root: Arc<PathBuf>,
    cache_header: HeaderValue,
}

impl StaticHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: Arc::new(root),
            cache_header: HeaderValue::from_static("public, max-age=86400"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub async fn index(&self) -> Result<warp::reply::Response, StaticError> {
        self.serve_relative("index.html").await
    }

    pub async fn asset(&self, path: &str) -> Result<warp::reply::Response, StaticError> {
        if path.is_empty() {
            return Err(StaticError::NotFound);
        }
        self.serve_relative(path).await
    }

    /// Renders `error`, negotiating the 404 body against `accept`.
    pub async fn error_response(
        &self,
        error: StaticError,
        accept: Option<&str>,
    ) -> warp::reply::Response {
        match error {
            StaticError::NotFound => self.not_found(accept).await,
            err @ StaticError::Io(_) => {
                let mut response = err.into_http_response();
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                response
            }
        }
    }

    pub async fn not_found(&self, accept: Option<&str>) -> warp::reply::Response {
        let format = NotFoundFormat::negotiate(accept);
        tracing::debug!(?format, "serving not found");

        let mut response = match format {
            NotFoundFormat::Html => {
                let page = self.custom_not_found_page().await;
                let mut response = Response::new(Body::from(page));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                response
            }
            NotFoundFormat::Json => {
                ErrorResponse::new(NOT_FOUND_MESSAGE).into_response(StatusCode::NOT_FOUND)
            }
            NotFoundFormat::Text => {
                let mut response = Response::new(Body::from(NOT_FOUND_MESSAGE));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
        };

        *response.status_mut() = StatusCode::NOT_FOUND;
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }

    async fn custom_not_found_page(&self) -> Vec<u8> {
        match self.resolve("404.html") {
            Ok(path) => match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(_) => NOT_FOUND_PAGE.as_bytes().to_vec(),
            },
            Err(_) => NOT_FOUND_PAGE.as_bytes().to_vec(),
        }
    }

    async fn serve_relative(&self, relative: &str) -> Result<warp::reply::Response, StaticError> {
        let resolved = self.resolve(relative)?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StaticError::NotFound),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StaticError::NotFound)
            }
            Err(err) => return Err(StaticError::Io(err)),
        }
        let bytes = fs::read(&resolved).await?;

        let mime = MimeGuess::from_path(&resolved).first_or_octet_stream();
        Ok(self.build_response(bytes, mime))
    }

    fn build_response(&self, bytes: Vec<u8>, mime: mime::Mime) -> warp::reply::Response {
        let mut response = Response::new(Body::from(bytes));
        let mut content_type = mime.essence_str().to_string();
        if mime.type_() == mime::TEXT {
            content_type.push_str("; charset=utf-8");
        }

        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, self.cache_header.clone());
        response
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StaticError> {
        let mut buf = PathBuf::new();
        for comp in Path::new(path).components() {
            match comp {
                Component::Normal(seg) => buf.push(seg),
                Component::CurDir => {}
                Component::RootDir => {}
                Component::Prefix(_) | Component::ParentDir => return Err(StaticError::NotFound),
            }
        }

        if buf.as_os_str().is_empty() {
            return Err(StaticError::NotFound);
        }

        Ok(self.root.join(buf))
    }
}
