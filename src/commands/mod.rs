//! Command handlers for the bloom CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod auth;
mod import;
mod init;
mod passive;
mod report;
mod time;
mod watch;

use crate::error::{ErrorType, IntoResult};
use crate::model::RecordError;
use crate::Result;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use auth::{login, logout, require_user, whoami};
pub use import::import;
pub use init::init;
pub use passive::{passive_get, passive_list};
pub use report::{coverage, dividends, utilities};
pub use time::{time_add, time_list, time_pay, time_summary};
pub use watch::watch;

/// The output type for a command. This allows the command to return a consistent message,
/// optionally a rendered report for stdout, and optionally structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Rendered text that is the product of the command, e.g. a pivot table.
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            report: None,
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            report: None,
            structure: None,
        }
    }

    /// Attach the rendered report that `print` writes to stdout.
    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the report to stdout, the message to `info!` and the structured data (if it exists)
    /// as JSON to `debug!`.
    pub fn print(&self) {
        if let Some(report) = self.report() {
            print!("{report}");
        }
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Tags a data access failure as a `record` error when a row failed validation, otherwise as a
/// `store` error.
fn store_result<T>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.downcast_ref::<RecordError>().is_some() => {
            Err(e).pub_result(ErrorType::Record)
        }
        other => other.pub_result(ErrorType::Store),
    }
}
