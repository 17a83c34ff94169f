//! Response middleware filling the `path` field of error bodies.
//!
//! The error envelope includes the request path, but `IntoResponse` runs
//! without access to the URI. This middleware owns that join: it buffers
//! error bodies (small by construction), sets `path`, and passes everything
//! else through untouched.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Upper bound for a buffered error body. Real error envelopes are tiny;
/// anything larger passes through unmodified.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Fill `path` in JSON error envelopes.
pub async fn fill_error_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return (parts.status, "").into_response(),
    };
    // The body length changes below; let hyper recompute it.
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    let rewritten = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|mut value| {
            let object = value.as_object_mut()?;
            if object.contains_key("statusCode") {
                object.insert("path".to_string(), serde_json::Value::String(path));
                serde_json::to_vec(&value).ok()
            } else {
                None
            }
        });

    match rewritten {
        Some(body) => Response::from_parts(parts, Body::from(body)),
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}
