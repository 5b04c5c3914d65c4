//! Typed failures surfaced by the metadata API and the schema loader.
//!
//! Every variant renders as a message fit to show an analyst; the engine
//! stores these strings in project state rather than propagating them.

use thiserror::Error;

pub(crate) const GENERIC_ERROR_MESSAGE: &str =
    "There was an error, please report this to an administrator.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("There has been an error, please try reloading the page or logging in again.")]
    MissingToken,

    #[error("Your session has expired. Please refresh.")]
    TokenExpired,

    /// Non-success response; carries the server's first message when present.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("There was an error, please report this to an administrator.")]
    Transport(String),

    #[error("An error occurred parsing project metadata")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// Which schema call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAspect {
    Fields,
    Views,
    Details,
    /// The schema task itself failed before reporting a result.
    Schema,
}

impl SchemaAspect {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaAspect::Fields => "fields",
            SchemaAspect::Views => "views",
            SchemaAspect::Details => "details",
            SchemaAspect::Schema => "schema",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unable to load project {}: {source}", .aspect.as_str())]
pub struct SchemaError {
    pub aspect: SchemaAspect,
    #[source]
    pub source: ApiError,
}

impl SchemaError {
    pub fn new(aspect: SchemaAspect, source: ApiError) -> Self {
        Self { aspect, source }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
