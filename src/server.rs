use crate::error::RecognizeError;
use crate::pipeline::Recognizer;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

/// Multipart field holding the uploaded image.
pub const IMAGE_FIELD: &str = "image";

impl IntoResponse for RecognizeError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecognizeError::UnsupportedFormat { .. }
            | RecognizeError::InvalidImage(_)
            | RecognizeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RecognizeError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RecognizeError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecognizeError::Preprocess(_)
            | RecognizeError::Inference(_)
            | RecognizeError::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Builds the HTTP routes around a shared [`Recognizer`].
pub fn router(recognizer: Recognizer) -> Router {
    let body_limit = recognizer.config().max_upload_bytes;
    Router::new()
        .route("/", get(|| async { "Welcome to infernum-recognize!" }))
        .route("/status", get(get_status))
        .route(
            "/recognize",
            post(post_recognize).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(recognizer)
}

async fn get_status(State(recognizer): State<Recognizer>) -> impl IntoResponse {
    Json(json!({
        "status": recognizer.engine_state().as_str(),
        "labels": recognizer.vocabulary().len(),
    }))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "error": "method not allowed, use POST" })),
    )
}

async fn post_recognize(
    State(recognizer): State<Recognizer>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let bytes = match read_image_field(multipart).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Rejected upload: {}", e);
            return e.into_response();
        }
    };

    log::debug!("Received {} byte image", bytes.len());
    match recognizer.recognize(bytes).await {
        Ok(results) => {
            log::info!(
                "Recognized image, top label: {}",
                results.first().map_or("<none>", |r| r.label.as_str())
            );
            Json(results).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                log::warn!("Rejected image: {}", e);
            } else {
                log::error!("Recognition failed: {}", e);
            }
            e.into_response()
        }
    }
}

async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<axum::body::Bytes, RecognizeError> {
    let mut multipart = multipart.map_err(|e| {
        RecognizeError::BadRequest(format!("error reading image file: {}", e.body_text()))
    })?;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() == Some(IMAGE_FIELD) {
            return field.bytes().await.map_err(upload_error);
        }
    }

    Err(RecognizeError::BadRequest(format!(
        "error reading image file: no multipart field named `{IMAGE_FIELD}`"
    )))
}

fn upload_error(e: MultipartError) -> RecognizeError {
    let message = format!("error reading image file: {}", e.body_text());
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RecognizeError::PayloadTooLarge(message)
    } else {
        RecognizeError::BadRequest(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (
                RecognizeError::UnsupportedFormat {
                    attempted: vec!["JPEG"],
                },
                StatusCode::BAD_REQUEST,
            ),
            (RecognizeError::InvalidImage("x".into()), StatusCode::BAD_REQUEST),
            (RecognizeError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                RecognizeError::PayloadTooLarge("x".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                RecognizeError::Preprocess("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RecognizeError::Inference("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RecognizeError::Timeout(Duration::from_secs(1)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            let response = err.into_response();
            assert_eq!(response.status(), status);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json"
            );
        }
    }
}
