//! These structs provide the CLI interface for the bloom CLI.

use crate::api::Table;
use crate::model::record::parse_timestamp;
use crate::render::OutputFormat;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// bloom: A command-line tool for tracking passive income.
///
/// The purpose of this program is to show how much of your household utility expenses are covered
/// by dividend income. It reads your dividend payments, utility bills, passive income log and
/// billable time from a hosted data store and prints monthly pivots, totals and coverage.
///
/// You need a hosted Postgres project with a REST endpoint, and an account with the
/// authentication provider. Run `bloom init` once, then `bloom login`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need two things ready beforehand.
    ///
    /// - The base URL of your data store project, passed as --store-url.
    ///
    /// - A JSON file with your API keys, passed as --credentials. It looks like this:
    ///   {"store_api_key": "...", "auth_api_key": "..."}
    ///   The file is moved into $BLOOM_HOME/.secrets.
    Init(InitArgs),
    /// Sign in with your email address and password.
    Login(LoginArgs),
    /// Sign out and forget the saved session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Utility expenses by category and month.
    Utilities(ReportArgs),
    /// Dividend income by ticker and month.
    Dividends(ReportArgs),
    /// How much of your utility expenses your dividends cover.
    Coverage(ReportArgs),
    /// The passive income log.
    #[command(subcommand)]
    Passive(PassiveCommand),
    /// Billable time entries.
    #[command(subcommand)]
    Time(TimeCommand),
    /// Add utility expense or dividend rows from a CSV file.
    Import(ImportArgs),
    /// Run the inactivity timer in this terminal.
    ///
    /// Every line you type counts as activity. When the logout warning shows, type 'stay' to
    /// remain signed in or 'logout' to sign out right away.
    Watch,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where bloom configuration and secrets are held. Defaults to ~/bloom
    #[arg(long, env = "BLOOM_HOME", default_value_t = default_bloom_home())]
    bloom_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, bloom_home: PathBuf) -> Self {
        Self {
            log_level,
            bloom_home: bloom_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn bloom_home(&self) -> &DisplayPath {
        &self.bloom_home
    }
}

/// Args for the `bloom init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of your data store project, e.g. https://abcdefgh.supabase.co
    #[arg(long)]
    store_url: String,

    /// The path to your credentials JSON. This file will be moved to the default secrets location
    /// in the main data directory.
    #[arg(long)]
    credentials: PathBuf,
}

impl InitArgs {
    pub fn new(store_url: impl Into<String>, credentials: impl Into<PathBuf>) -> Self {
        Self {
            store_url: store_url.into(),
            credentials: credentials.into(),
        }
    }

    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    pub fn credentials(&self) -> &Path {
        &self.credentials
    }
}

/// Args for the `bloom login` command.
#[derive(Parser, Clone)]
pub struct LoginArgs {
    #[arg(long, env = "BLOOM_EMAIL")]
    email: String,

    /// Read from BLOOM_PASSWORD when not given.
    #[arg(long, env = "BLOOM_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// The password stays out of logs.
impl std::fmt::Debug for LoginArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginArgs")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Args shared by the report commands.
#[derive(Debug, Parser, Clone, Default)]
pub struct ReportArgs {
    /// Only include records from this year. Without it, the same month of different years is
    /// added together.
    #[arg(long)]
    year: Option<i32>,

    /// How to print the report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ReportArgs {
    pub fn new(year: Option<i32>, format: OutputFormat) -> Self {
        Self { year, format }
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum PassiveCommand {
    /// List every passive income row.
    List(FormatArgs),
    /// Show one passive income row.
    Get(PassiveGetArgs),
}

#[derive(Debug, Parser, Clone, Default)]
pub struct FormatArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl FormatArgs {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PassiveGetArgs {
    id: i64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl PassiveGetArgs {
    pub fn new(id: i64, format: OutputFormat) -> Self {
        Self { id, format }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TimeCommand {
    /// List time entries, unpaid first.
    List(FormatArgs),
    /// Record a block of work. Hours and amount are calculated from the configured rate.
    Add(TimeAddArgs),
    /// Mark an unpaid entry as paid.
    Pay(TimePayArgs),
    /// Total and unpaid hours and amounts.
    Summary(FormatArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct TimeAddArgs {
    /// When the work started, e.g. 2025-07-01T09:00:00Z. Times without an offset are UTC.
    #[arg(long, value_parser = parse_time)]
    start: DateTime<Utc>,

    /// When the work ended. Must be after --start.
    #[arg(long, value_parser = parse_time)]
    end: DateTime<Utc>,
}

impl TimeAddArgs {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[derive(Debug, Parser, Clone)]
pub struct TimePayArgs {
    id: String,
}

impl TimePayArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// The tables that `bloom import` can write to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportTable {
    Utilities,
    Dividends,
}

serde_plain::derive_display_from_serialize!(ImportTable);
serde_plain::derive_fromstr_from_deserialize!(ImportTable);

impl From<ImportTable> for Table {
    fn from(value: ImportTable) -> Self {
        match value {
            ImportTable::Utilities => Table::UtilityExpenses,
            ImportTable::Dividends => Table::DividendIncome,
        }
    }
}

/// Args for the `bloom import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// Which table to add the rows to.
    #[arg(long, value_enum)]
    table: ImportTable,

    /// A CSV file with the header `category_name,create_date,amount`.
    #[arg(long)]
    file: PathBuf,
}

impl ImportArgs {
    pub fn new(table: ImportTable, file: impl Into<PathBuf>) -> Self {
        Self {
            table,
            file: file.into(),
        }
    }

    pub fn table(&self) -> ImportTable {
        self.table
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).ok_or_else(|| format!("'{s}' is not a timestamp like 2025-07-01T09:00:00Z"))
}

fn default_bloom_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("bloom"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --bloom-home or BLOOM_HOME instead of relying on the default \
                bloom home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("bloom")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        <Args as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_report() {
        let args = Args::try_parse_from([
            "bloom",
            "--bloom-home",
            "/tmp/b",
            "dividends",
            "--year",
            "2025",
            "--format",
            "csv",
        ])
        .unwrap();
        assert_eq!(args.common().bloom_home().path(), Path::new("/tmp/b"));
        match args.command() {
            Command::Dividends(report) => {
                assert_eq!(report.year(), Some(2025));
                assert_eq!(report.format(), OutputFormat::Csv);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_time_add() {
        let args = Args::try_parse_from([
            "bloom",
            "time",
            "add",
            "--start",
            "2025-07-01T09:00",
            "--end",
            "2025-07-01T10:30:00+00:00",
        ])
        .unwrap();
        let Command::Time(TimeCommand::Add(add)) = args.command() else {
            panic!("expected time add");
        };
        assert_eq!(add.start().to_rfc3339(), "2025-07-01T09:00:00+00:00");
        assert!(add.end() > add.start());
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(Args::try_parse_from(["bloom", "time", "add", "--start", "x", "--end", "y"]).is_err());
    }

    #[test]
    fn test_login_debug_hides_password() {
        let args = Args::try_parse_from([
            "bloom",
            "login",
            "--email",
            "a@b.co",
            "--password",
            "hunter2secret",
        ])
        .unwrap();
        let Command::Login(login) = args.command() else {
            panic!("expected login");
        };
        assert_eq!(login.password(), "hunter2secret");
        let debug = format!("{args:?}");
        assert!(!debug.contains("hunter2secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("a@b.co"));
    }

    #[test]
    fn test_import_table() {
        let args = Args::try_parse_from([
            "bloom", "import", "--table", "utilities", "--file", "bills.csv",
        ])
        .unwrap();
        let Command::Import(import) = args.command() else {
            panic!("expected import");
        };
        assert_eq!(Table::from(import.table()), Table::UtilityExpenses);
    }
}
