//! Error taxonomy for Strata
//!
//! Every component-local failure carries exactly one [`ErrorKind`]. The kind
//! owns a stable numeric code and a wire status, which lets the ingress
//! service and the routing client translate errors in both directions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message emitted on the wire for anything that must not leak detail.
pub const GENERIC_INTERNAL_MESSAGE: &str = "something went really bad";

/// Closed set of semantic error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Internal,
    NotFound,
    AlreadyExist,
    BadChecksum,
    BadInputData,
    Forbidden,
    TooBig,
    UploadIsPartial,
    UserNotFound,
}

impl ErrorKind {
    /// Every kind, in code order.
    pub const ALL: [Self; 9] = [
        Self::Internal,
        Self::NotFound,
        Self::AlreadyExist,
        Self::BadChecksum,
        Self::BadInputData,
        Self::Forbidden,
        Self::TooBig,
        Self::UploadIsPartial,
        Self::UserNotFound,
    ];

    /// Stable taxonomy code, independent of the wire status
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Internal => 0,
            Self::NotFound => 1,
            Self::AlreadyExist => 2,
            Self::BadChecksum => 3,
            Self::BadInputData => 4,
            Self::Forbidden => 5,
            Self::TooBig => 6,
            Self::UploadIsPartial => 7,
            Self::UserNotFound => 8,
        }
    }

    /// Inverse of [`ErrorKind::code`]
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Internal),
            1 => Some(Self::NotFound),
            2 => Some(Self::AlreadyExist),
            3 => Some(Self::BadChecksum),
            4 => Some(Self::BadInputData),
            5 => Some(Self::Forbidden),
            6 => Some(Self::TooBig),
            7 => Some(Self::UploadIsPartial),
            8 => Some(Self::UserNotFound),
            _ => None,
        }
    }

    /// HTTP status code used on the wire, if the kind has one
    #[must_use]
    pub const fn http_status_code(self) -> Option<u16> {
        match self {
            Self::UploadIsPartial => Some(206),
            Self::BadInputData => Some(400),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::AlreadyExist => Some(409),
            Self::BadChecksum => Some(412),
            Self::TooBig => Some(413),
            Self::Internal => Some(500),
            Self::UserNotFound => None,
        }
    }

    /// Kind a wire status translates back into
    #[must_use]
    pub const fn from_http_status(status: u16) -> Option<Self> {
        match status {
            206 => Some(Self::UploadIsPartial),
            400 => Some(Self::BadInputData),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            409 => Some(Self::AlreadyExist),
            412 => Some(Self::BadChecksum),
            413 => Some(Self::TooBig),
            500 => Some(Self::Internal),
            _ => None,
        }
    }

    const fn default_message(self) -> &'static str {
        match self {
            Self::Internal => GENERIC_INTERNAL_MESSAGE,
            Self::NotFound => "not found",
            Self::AlreadyExist => "already exist",
            Self::BadChecksum => "checksum mismatch",
            Self::BadInputData => "bad input data",
            Self::Forbidden => "forbidden",
            Self::TooBig => "maximum file size exceeded",
            Self::UploadIsPartial => "upload is partial",
            Self::UserNotFound => "user not found",
        }
    }
}

/// Taxonomy-coded error shared by every component
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn already_exist(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExist, msg)
    }

    pub fn bad_checksum(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadChecksum, msg)
    }

    pub fn bad_input_data(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInputData, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }

    pub fn too_big(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooBig, msg)
    }

    pub fn upload_is_partial(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UploadIsPartial, msg)
    }

    pub fn user_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound, msg)
    }

    /// Rebuild a typed error from a response status.
    ///
    /// Unmapped statuses become `Internal` with the status in the message.
    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        match ErrorKind::from_http_status(status) {
            Some(ErrorKind::Internal) | None => {
                Self::internal(format!("http status code: {status}"))
            }
            Some(kind) => Self::new(kind, kind.default_message()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub const fn code(&self) -> u32 {
        self.kind.code()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Serialize the error as a JSON envelope
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        ErrorEnvelope::from(self).to_json()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::already_exist(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

/// Wire representation of an error: `{"code": .., "message": ..}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u32,
    pub message: String,
}

impl ErrorEnvelope {
    /// Build an envelope from any error.
    ///
    /// Errors outside the taxonomy, and `Internal` ones, are reported with
    /// the generic message so no internal detail reaches the caller.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        err.downcast_ref::<Error>().map_or_else(
            || Self {
                code: ErrorKind::Internal.code(),
                message: GENERIC_INTERNAL_MESSAGE.to_string(),
            },
            Self::from,
        )
    }

    /// Kind named by the envelope's code; unknown codes are `Internal`
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code).unwrap_or(ErrorKind::Internal)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        let message = if err.kind == ErrorKind::Internal {
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            err.message.clone()
        };
        Self {
            code: err.code(),
            message,
        }
    }
}

impl From<ErrorEnvelope> for Error {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self::new(envelope.kind(), envelope.message)
    }
}
