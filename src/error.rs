use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-wide error taxonomy. Every variant is recoverable at the caller
/// except `Database`, which is logged and masked.
#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "{}", _0)]
    Validation(String),
    #[display(fmt = "{}", _0)]
    InvalidState(String),
    #[display(fmt = "a break was already taken for this day")]
    BreakAlreadyTaken,
    #[display(fmt = "{}", _0)]
    AlreadyExists(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "the attendance record is busy, retry shortly")]
    Concurrency,
    #[display(fmt = "internal database error")]
    Database(sqlx::Error),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::BreakAlreadyTaken => "break_already_taken",
            ServiceError::AlreadyExists(_) => "already_exists",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Concurrency => "concurrency_error",
            ServiceError::Database(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            // Unique(user_id, date) backstop under races the keyed lock missed
            if db_err.is_unique_violation() {
                return ServiceError::AlreadyExists(
                    "an attendance record already exists for this user and date".into(),
                );
            }
        }
        ServiceError::Database(e)
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidState(_)
            | ServiceError::BreakAlreadyTaken
            | ServiceError::AlreadyExists(_)
            | ServiceError::Concurrency => StatusCode::CONFLICT,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ServiceError::Database(e) = self {
            tracing::error!(error = %e, "request failed on database access");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "kind": self.kind(),
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_kinds() {
        assert_eq!(
            ServiceError::Validation("reason is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::NotFound("no record".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::Concurrency.status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::BreakAlreadyTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServiceError::AlreadyExists("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
