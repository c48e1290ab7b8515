use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
    pub reason: Option<ConflictReason>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    InvalidTransition,
    Validation,
    Conflict,
    Authorization,
    NotFound,
}

/// Tag carried by conflict errors so callers can tell the races apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictReason {
    JourneyClosed,
    AlreadyDecided,
    RaceLost,
    BidNotPending,
    StaleVersion,
}

impl ConflictReason {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::JourneyClosed => "journey-closed",
            Self::AlreadyDecided => "already-decided",
            Self::RaceLost => "race-lost",
            Self::BidNotPending => "bid-not-pending",
            Self::StaleVersion => "stale-version",
        }
    }
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(reason) => write!(f, "{} ({}): {}", self.message, self.code, reason),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        Error::env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::reqwest_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        tracing::error!("authorizor error: {}", err);
        Error::unexpected_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
        };

        let error_message = match self.kind() {
            ErrorKind::Internal => "Internal Server Error",
            _ => self.message.as_str(),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
            "reason": self.reason.map(|reason| reason.tag()),
        }));

        (status, body).into_response()
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            100 => ErrorKind::InvalidTransition,
            101 => ErrorKind::Validation,
            102 => ErrorKind::Conflict,
            103 => ErrorKind::Authorization,
            104 => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_conflict_error(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_not_found_error(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_authorization_error(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }

    pub fn invalid_transition_error(from: &str, to: &str) -> Self {
        Self {
            code: 100,
            message: format!("invalid transition from {} to {}", from, to),
            reason: None,
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            code: 101,
            message: message.into(),
            reason: None,
        }
    }

    pub fn conflict_error(reason: ConflictReason) -> Self {
        Self {
            code: 102,
            message: "conflict".into(),
            reason: Some(reason),
        }
    }

    pub fn authorization_error() -> Self {
        Self {
            code: 103,
            message: "unauthorized".into(),
            reason: None,
        }
    }

    pub fn not_found_error(what: &str) -> Self {
        Self {
            code: 104,
            message: format!("{} not found", what),
            reason: None,
        }
    }

    pub fn env_var_error(_: env::VarError) -> Self {
        Self {
            code: 1,
            message: "environment variable error".into(),
            reason: None,
        }
    }

    pub fn database_error<T: Debug>(err: T) -> Self {
        tracing::error!("database error: {:?}", err);

        Self {
            code: 2,
            message: "database error".into(),
            reason: None,
        }
    }

    pub fn reqwest_error(err: reqwest::Error) -> Self {
        tracing::error!("reqwest error: {}", err);

        Self {
            code: 3,
            message: "reqwest error".into(),
            reason: None,
        }
    }

    pub fn upstream_error() -> Self {
        Self {
            code: 4,
            message: "upstream error".into(),
            reason: None,
        }
    }

    pub fn unexpected_error() -> Self {
        Self {
            code: 5,
            message: "unexpected error".into(),
            reason: None,
        }
    }

    pub fn config_error(key: &str) -> Self {
        Self {
            code: 6,
            message: format!("invalid configuration value for {}", key),
            reason: None,
        }
    }

    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        self.reason
    }
}
