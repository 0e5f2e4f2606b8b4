//! Upload and download endpoints
//!
//! Both endpoints take their argument from the `clawio-api-arg` header. A
//! malformed argument is answered with a JSON error envelope; every other
//! upload failure is reported by status code alone.

use axum::{
    Extension,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::sync::atomic::Ordering;
use strata_common::{
    API_ARG_HEADER, ByteStream, CHECKSUM_HEADER, Error, ErrorEnvelope, ErrorKind,
    FILE_CONTENT_TYPE, PathRequest, User, base_name,
};
use tracing::{Span, debug, error, info, warn};

use crate::AppState;
use crate::limit::LimitedStream;

pub async fn health_check() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"status":"healthy"}"#,
    )
        .into_response()
}

fn json_error(status: StatusCode, err: &Error) -> Response {
    let envelope = ErrorEnvelope::from(err);
    match envelope.to_json() {
        Ok(body) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("failed to encode error envelope: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Decode the per-request argument; an absent header is malformed too
fn path_request(headers: &HeaderMap) -> Result<PathRequest, Error> {
    let raw = headers
        .get(API_ARG_HEADER)
        .map(|v| std::str::from_utf8(v.as_bytes()).unwrap_or_default())
        .unwrap_or_default();
    let request = PathRequest::from_header_value(raw)?;
    if let Some(extra) = request.extra.as_ref() {
        let extra = serde_json::Value::Object(extra.clone());
        Span::current().record("extra", tracing::field::display(extra));
    }
    Ok(request)
}

/// Parse and normalize the argument, or produce the early response
fn target_path(headers: &HeaderMap, operation: &str) -> Result<String, Response> {
    let request = path_request(headers).map_err(|e| {
        warn!("{} rejected: {}", operation, e);
        json_error(StatusCode::BAD_REQUEST, &e)
    })?;
    let path = request.normalized_path();
    if path == "/" {
        warn!("{} on the root folder refused", operation);
        return Err(StatusCode::FORBIDDEN.into_response());
    }
    Ok(path)
}

#[derive(Deserialize)]
struct ChecksumQuery {
    checksum: Option<String>,
}

/// Client checksum from the `checksum` header, else the query string
fn client_checksum(headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(value) = headers
        .get(CHECKSUM_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return value.to_string();
    }
    Query::<ChecksumQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.checksum)
        .unwrap_or_default()
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// `POST /data/upload`
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let path = match target_path(&headers, "upload") {
        Ok(path) => path,
        Err(response) => return response,
    };

    let max = state.upload.max_file_size;
    if declared_length(&headers).is_some_and(|len| len > max) {
        warn!(path = %path, max, "declared upload size exceeds the limit");
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let checksum = client_checksum(&headers, &uri);
    let stream: ByteStream = Box::pin(body.into_data_stream().map_err(std::io::Error::other));
    let limited = LimitedStream::new(stream, max);
    let tripped = limited.tripped();

    let result = state
        .backend
        .upload_file(&user, &path, Box::pin(limited), &checksum)
        .await;

    if tripped.load(Ordering::SeqCst) {
        error!(path = %path, max, "request body max size exceeded");
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    match result {
        Ok(()) => {
            info!(path = %path, "upload complete");
            StatusCode::CREATED.into_response()
        }
        Err(e) => upload_error(&path, &e),
    }
}

fn upload_error(path: &str, err: &Error) -> Response {
    match err.kind() {
        ErrorKind::NotFound => {
            warn!(path, "upload failed: {}", err);
            StatusCode::NOT_FOUND
        }
        ErrorKind::BadChecksum => {
            error!(path, "file corruption on upload: {}", err);
            StatusCode::PRECONDITION_FAILED
        }
        ErrorKind::UploadIsPartial => {
            warn!(path, "upload is partial: {}", err);
            StatusCode::PARTIAL_CONTENT
        }
        _ => {
            error!(path, "unexpected error uploading file: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
    .into_response()
}

/// `POST /data/download`
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Response {
    let path = match target_path(&headers, "download") {
        Ok(path) => path,
        Err(response) => return response,
    };

    let stream = match state.backend.download_file(&user, &path).await {
        Ok(stream) => stream,
        Err(e) => return download_error(&path, &e),
    };
    debug!(path = %path, "streaming file");

    let log_path = path.clone();
    let body = Body::from_stream(stream.inspect_err(move |e| {
        error!(path = %log_path, "error writing response body: {}", e);
    }));

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(FILE_CONTENT_TYPE),
    );
    let disposition = format!("attachment; filename='{}'", base_name(&path));
    match HeaderValue::from_bytes(disposition.as_bytes()) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(_) => {
            warn!(path = %path, "file name not representable in a header");
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment"),
            );
        }
    }
    response
}

fn download_error(path: &str, err: &Error) -> Response {
    match err.kind() {
        ErrorKind::NotFound => {
            debug!(path, "download of missing file: {}", err);
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Not Found",
            )
                .into_response()
        }
        ErrorKind::BadInputData => {
            warn!(path, "download rejected: {}", err);
            json_error(StatusCode::BAD_REQUEST, err)
        }
        _ => {
            error!(path, "unexpected error downloading file: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
