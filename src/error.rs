//! Error types shared across the crate.
//!
//! Internally everything is an `anyhow::Error`. At the command boundary errors are tagged with an
//! `ErrorType` so that the message shown to the user says which collaborator failed.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of a failure, used to build the user-visible message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The home directory or `config.json` is missing or invalid.
    Config,
    /// The hosted data store returned an error or could not be reached.
    Store,
    /// The authentication provider rejected the request, or there is no signed-in user.
    Auth,
    /// The request made by the user is invalid, e.g. a time range that ends before it starts.
    Request,
    /// A row from the data store failed validation.
    Record,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// Converts an internal result into one whose error is suitable for showing to the user.
pub trait IntoResult<T> {
    /// Tags the error with `error_type`, keeping the original error chain as the source.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let e: Error = e.into();
            let message = format!("{error_type} error: {e}");
            e.context(message)
        })
    }
}
