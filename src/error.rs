//! Error handling for halogen.
//!
//! Internally everything is an `anyhow::Error`. At the points where a failure has a meaning the
//! front ends care about, the error is wrapped in an [`Error`] carrying an [`ErrorType`] using
//! [`IntoResult::pub_result`]. The front ends later recover the type with [`error_type`] to decide
//! what to tell the user.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// The kinds of failure that are distinguished when reporting errors to the user.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Bad command arguments, e.g. a payee name containing digits.
    InvalidInput,
    /// A header, payee row, worksheet, game or task does not exist.
    NotFound,
    /// A call to Google Sheets, Discord, Mojang or Steam failed.
    RemoteService,
    /// The configuration is missing or malformed.
    Config,
    /// A local file could not be read or written.
    Io,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// An error that has been classified with an `ErrorType`.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.source, f)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.error_type, self.source)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let inner: &(dyn StdError + Send + Sync + 'static) = self.source.as_ref();
        Some(inner)
    }
}

/// Attaches an `ErrorType` to the error of a `Result`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| classify(error_type, e.into()))
    }
}

/// Wraps `source` in an `Error` of type `error_type`.
pub(crate) fn classify(error_type: ErrorType, source: anyhow::Error) -> anyhow::Error {
    anyhow::Error::new(Error { error_type, source })
}

/// Creates a new `ErrorType::InvalidInput` error with `message`.
pub(crate) fn invalid_input(message: impl Display + Send + Sync + 'static) -> anyhow::Error {
    classify(ErrorType::InvalidInput, anyhow::anyhow!("{message}"))
}

/// Creates a new `ErrorType::NotFound` error with `message`.
pub(crate) fn not_found(message: impl Display + Send + Sync + 'static) -> anyhow::Error {
    classify(ErrorType::NotFound, anyhow::anyhow!("{message}"))
}

/// Returns the outermost `ErrorType` found in the chain of `e`, if any.
pub fn error_type(e: &anyhow::Error) -> Option<ErrorType> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::error_type)
}
