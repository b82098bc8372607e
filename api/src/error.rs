use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use credits::CreditError;

pub type Result<T> = core::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Internal,
    UserAuth,
    NotFound,
    NotPending,
    Invalid(String),
    Verify(String),
}

impl From<CreditError> for ApiError {
    fn from(e: CreditError) -> ApiError {
        match e {
            CreditError::InvalidAmount(_)
            | CreditError::UnsupportedRail(_)
            | CreditError::UnknownEvent(_)
            | CreditError::InvalidPayload(_) => ApiError::Invalid(e.message()),
            CreditError::Signature(_) => ApiError::Verify(e.message()),
            CreditError::MethodNotFound | CreditError::PurchaseNotFound => ApiError::NotFound,
            CreditError::NotPending => ApiError::NotPending,
            CreditError::Misconfigured(msg) => {
                error!("misconfigured: {}", msg);
                ApiError::Internal
            }
            CreditError::Gateway(err) => {
                error!("gateway: {:?}", err);
                ApiError::Internal
            }
            CreditError::Storage(err) => {
                error!("storage: {:?}", err);
                ApiError::Internal
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> ApiError {
        error!("internal: {:?}", e);
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, error) = match self {
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned()),
            Self::UserAuth => (StatusCode::BAD_REQUEST, "user auth error".to_owned()),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
            Self::NotPending => (StatusCode::BAD_REQUEST, "purchase is not pending".to_owned()),
            Self::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Verify(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (
            code,
            Json(serde_json::json!({
                "status": "failure",
                "error": error
            })),
        )
            .into_response()
    }
}
