//! Error taxonomy for the monitor
//!
//! Fetch failures are never fatal: the scheduler logs them and hands them to
//! the fallback policy. Control errors are returned to the caller.

/// Failure of one API fetch
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("inconsistent heatmap payload: {0}")]
    Shape(#[from] ShapeError),
    #[error("{0}")]
    Unavailable(String),
    #[error("invalid base url {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Transport-level failure (request rejected or non-success status)
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. } | FetchError::Status { .. } | FetchError::Unavailable(_))
    }

    /// Response arrived but could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode { .. } | FetchError::Shape(_))
    }
}

/// Heatmap payload whose grids disagree with the declared resolution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("{grid} grid has {actual} rows, expected {expected}")]
    Rows { grid: &'static str, expected: usize, actual: usize },
    #[error("{grid} grid row {row} has {actual} cells, expected {expected}")]
    Columns { grid: &'static str, row: usize, expected: usize, actual: usize },
    #[error("empty resolution {width}x{height}")]
    EmptyResolution { width: usize, height: usize },
}

/// Misuse of the scheduler control surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("unsupported cadence {0}s (choose 1, 5, 10 or 30)")]
    InvalidCadence(u64),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("scheduler is not running")]
    SchedulerClosed,
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<SchedulerError> for ConfigError {
    fn from(err: SchedulerError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}
