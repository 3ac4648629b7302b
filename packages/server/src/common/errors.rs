use thiserror::Error;

/// Errors returned by every use case.
///
/// Each business variant carries a stable machine code (`SEQUENCE_ERROR`,
/// `MANDATE_CONFLICT`, ...) and a human message. The HTTP layer maps the
/// variant to a status code exactly once.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input (400)
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// Well-formed input that breaks a business rule (422)
    #[error("{code}: {message}")]
    Validation { code: &'static str, message: String },

    /// Missing or bad credentials (401)
    #[error("{code}: {message}")]
    Unauthorized { code: &'static str, message: String },

    /// Authenticated but not allowed (403)
    #[error("{code}: {message}")]
    Forbidden { code: &'static str, message: String },

    #[error("{code}: {message}")]
    NotFound { code: &'static str, message: String },

    /// State invariant violated (409)
    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },

    /// A required collaborator is missing (503)
    #[error("{code}: {message}")]
    Unavailable { code: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::validation("INVALID_AMOUNT", message)
    }

    pub fn invalid_escrow_state(message: impl Into<String>) -> Self {
        Self::conflict("INVALID_ESCROW_STATE", message)
    }

    pub fn idempotency_key_required() -> Self {
        Self::bad_request("IDEMPOTENCY_KEY_REQUIRED", "Idempotency-Key header is required")
    }

    pub fn idempotency_key_conflict(key: &str) -> Self {
        Self::conflict(
            "IDEMPOTENCY_KEY_CONFLICT",
            format!("idempotency key '{}' was already used for a different request", key),
        )
    }

    /// Stable code for the client. Infrastructure failures collapse to one code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. }
            | Self::Validation { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::Forbidden { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Unavailable { code, .. } => *code,
            Self::Database(sqlx::Error::PoolTimedOut) => "DATABASE_UNAVAILABLE",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. }
            | Self::Validation { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Unavailable { message, .. } => message.clone(),
            Self::Database(sqlx::Error::PoolTimedOut) => "database unavailable".to_string(),
            Self::Database(_) | Self::Internal(_) => "internal server error".to_string(),
        }
    }

    pub fn is_code(&self, expected: &str) -> bool {
        self.code() == expected
    }
}

/// True when a sqlx error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
