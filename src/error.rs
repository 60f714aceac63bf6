use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::db::StoreError;
use crate::translation::TranslationError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Failures a handler can report to the client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Word not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Gateway(TranslationError),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        match err {
            TranslationError::EmptyWord => Self::Validation(err.to_string()),
            other => Self::Gateway(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the same body as every other error
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Gateway(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Storage details stay in the log
            Self::Storage(err) => {
                error!("Storage error: {}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err: ApiError = StoreError::NotFound(7).into();
        assert!(matches!(err, ApiError::NotFound));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Word not found");
    }

    #[test]
    fn test_store_failure_maps_to_500() {
        let err: ApiError = StoreError::Database(sqlx::Error::PoolClosed).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_word_maps_to_validation() {
        let err: ApiError = TranslationError::EmptyWord.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No word provided");
    }

    #[test]
    fn test_gateway_failure_keeps_message() {
        let err: ApiError = TranslationError::NoChoices.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Payload {
        word: String,
    }

    fn json_request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder
            .body(axum::body::Body::from(body.to_string()))
            .expect("Should build request")
    }

    #[tokio::test]
    async fn test_api_json_accepts_valid_body() {
        let req = json_request(Some("application/json"), r#"{"word": "قلم"}"#);
        let ApiJson(payload) = ApiJson::<Payload>::from_request(req, &())
            .await
            .expect("Should extract");
        assert_eq!(payload.word, "قلم");
    }

    #[tokio::test]
    async fn test_api_json_rejections_map_to_validation() {
        for req in [
            json_request(None, r#"{"word": "قلم"}"#),
            json_request(Some("application/json"), "{not json"),
            json_request(Some("application/json"), r#"{"word": 5}"#),
        ] {
            let err = ApiJson::<Payload>::from_request(req, &())
                .await
                .expect_err("Should reject");
            assert!(matches!(err, ApiError::Validation(_)));
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert!(!err.to_string().is_empty());
        }
    }
}
