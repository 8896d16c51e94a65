use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Public projection of a stored url. The seed, the encrypted endpoint and
/// the password hash are never selected into it.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShortenedUrl {
    pub id: i64,
    pub path: String,
    pub expiration: Option<DateTime<Utc>>,
    pub visits: i64,
    pub once: bool,
    pub disabled: bool,
    pub secure: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub has_password: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenUrlData {
    pub endpoint: String,
    pub password: Option<String>,
    #[serde(default)]
    pub once: bool,
    /// Minutes from now.
    pub expire_in: Option<i64>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShortenUrlResult {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

/// Validated, encrypted row ready for insertion.
#[derive(Debug)]
pub(crate) struct NewUrl {
    pub path: String,
    pub encrypted_endpoint: String,
    pub crypto_seed: String,
    pub hashed_password: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    pub once: bool,
    pub secure: Option<bool>,
}

#[derive(FromRow)]
pub(crate) struct PasswordMaterial {
    pub hashed_password: Option<String>,
    pub crypto_seed: String,
}

#[derive(FromRow)]
pub(crate) struct LoggedVisit {
    pub crypto_seed: String,
    pub encrypted_endpoint: String,
    pub visits: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitRequest {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitErrorCode {
    NotFound,
    WrongPassword,
    Expired,
    EndpointError,
}

impl VisitErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitErrorCode::NotFound => "not-found",
            VisitErrorCode::WrongPassword => "wrong-password",
            VisitErrorCode::Expired => "expired",
            VisitErrorCode::EndpointError => "endpoint-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum VisitOutcome {
    Success { endpoint: String, secure: bool },
    Error { code: VisitErrorCode },
}

impl From<VisitErrorCode> for VisitOutcome {
    fn from(code: VisitErrorCode) -> Self {
        VisitOutcome::Error { code }
    }
}
