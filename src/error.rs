use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a browser session.
///
/// `ElementNotFound` and `Timeout` are soft: callers log them and carry on.
/// `Closed` and `WebDriver` mean the session itself is unusable.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("timed out after {waited:?} waiting for {condition}")]
    Timeout { condition: String, waited: Duration },

    #[error("session already closed")]
    Closed,

    #[error("webdriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl SessionError {
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::ElementNotFound {
            locator: locator.into(),
        }
    }

    /// True for failures the workflow recovers from by skipping a field or list.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. } | Self::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("currency symbol '{currency}' not found in '{text}'")]
    MissingCurrency { currency: String, text: String },

    #[error("cannot parse '{normalized}' as a price")]
    Unparseable { normalized: String },
}

/// Why a single product field could not be resolved.
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("{field} not found ({source})")]
    Missing {
        field: &'static str,
        #[source]
        source: SessionError,
    },

    #[error("{field} is empty")]
    Empty { field: &'static str },

    #[error("price is malformed: {0}")]
    Price(#[from] PriceError),

    #[error("product not available: '{availability}'")]
    Unavailable { availability: String },

    #[error("session failure: {0}")]
    Session(SessionError),
}

impl FieldError {
    pub fn missing(field: &'static str, source: SessionError) -> Self {
        if source.is_soft() {
            Self::Missing { field, source }
        } else {
            Self::Session(source)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("malformed product url: {url}")]
    MalformedUrl { url: String },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid price filter: min {min} / max {max}")]
    InvalidFilters { min: f64, max: f64 },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("could not determine local data directory")]
    NoDataDir,

    #[error("chrome executable not found")]
    ChromeNotFound,

    #[error("could not parse version from '{0}'")]
    Version(String),

    #[error("unsupported OS: {0}")]
    UnsupportedOs(String),

    #[error("chromedriver download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("chromedriver archive is invalid: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("chromedriver not found in archive")]
    MissingBinary,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chromedriver did not accept a session on port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: thirtyfour::error::WebDriverError,
    },

    #[error("invalid browser capability: {0}")]
    Capability(thirtyfour::error::WebDriverError),
}
