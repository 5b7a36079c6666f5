use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    // 添加便利方法
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::RepositoryError;

        match error {
            AppErr::Domain(err) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", err.to_string())
            }
            AppErr::AccountAlreadyRegistered => ApiError::new(
                StatusCode::BAD_REQUEST,
                "ACCOUNT_EXISTS",
                "Account already registered",
            ),
            AppErr::UserNotFound => ApiError::new(
                StatusCode::BAD_REQUEST,
                "USER_NOT_FOUND",
                "User does not exist",
            ),
            AppErr::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                // 并发注册撞上唯一约束时与预检结果保持一致
                RepositoryError::Conflict => ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "ACCOUNT_EXISTS",
                    "Account already registered",
                ),
                RepositoryError::Storage { message, .. } => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    format!("database error: {}", message),
                ),
            },
            AppErr::Encode(err) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ENCODE_ERROR",
                format!("encode error: {}", err),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
