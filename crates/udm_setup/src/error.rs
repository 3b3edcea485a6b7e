// ---------------------------------------------------------------------------
// SetupError: typed failures for every pipeline stage
// ---------------------------------------------------------------------------

use std::fmt;
use std::path::PathBuf;

/// Errors that stop a setup run.
///
/// Every variant is fatal; non-fatal conditions (an optional layer with no
/// matching file, a skipped metadata merge) are logged and never reach this
/// type. Each failure class maps to its own process status via
/// [`SetupError::exit_code`].
#[derive(Debug)]
pub enum SetupError {
    /// Malformed or missing layer declaration / scalar parameter.
    Config(String),
    /// The current-development layer has no matching discovered file.
    MandatoryLayerUnmatched { name: String },
    /// No grid file was supplied and none could be synthesised.
    GridMissing(String),
    /// More than one grid file was supplied.
    GridAmbiguous { count: usize },
    /// The grid exists but is unusable (no cell id column, duplicate ids, ...).
    GridInvalid(String),
    /// The remote feature API returned something other than HTTP 200.
    Api { status: u16, url: String },
    /// The request to the remote feature API never produced a response.
    ApiTransport(String),
    /// The rendering engine exited unsuccessfully or could not be launched.
    Engine(String),
    /// The rendering engine reported success but left no artifact behind.
    MissingArtifact(PathBuf),
    /// Filesystem error.
    Io(std::io::Error),
    /// CSV read/write error.
    Csv(String),
    /// JSON encode/decode error (GeoJSON payloads, metadata documents).
    Json(String),
    /// A vector input whose format this build cannot read.
    UnsupportedFormat(PathBuf),
    /// An input file whose contents could not be interpreted.
    MalformedInput(String),
}

pub type SetupResult<T> = Result<T, SetupError>;

impl SetupError {
    /// Process status reported for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            SetupError::Api { .. } | SetupError::ApiTransport(_) => 2,
            SetupError::Config(_) => 3,
            SetupError::MandatoryLayerUnmatched { .. } => 4,
            SetupError::GridMissing(_)
            | SetupError::GridAmbiguous { .. }
            | SetupError::GridInvalid(_) => 5,
            SetupError::Engine(_) | SetupError::MissingArtifact(_) => 6,
            SetupError::Io(_)
            | SetupError::Csv(_)
            | SetupError::Json(_)
            | SetupError::UnsupportedFormat(_)
            | SetupError::MalformedInput(_) => 7,
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Config(msg) => write!(f, "Configuration error: {msg}"),
            SetupError::MandatoryLayerUnmatched { name } => write!(
                f,
                "Mandatory layer unmatched: no input file found for '{name}'"
            ),
            SetupError::GridMissing(msg) => write!(f, "No grid available: {msg}"),
            SetupError::GridAmbiguous { count } => write!(
                f,
                "Grid ambiguous: found {count} grid files, expected exactly one"
            ),
            SetupError::GridInvalid(msg) => write!(f, "Invalid grid: {msg}"),
            SetupError::Api { status, url } => write!(
                f,
                "Feature API returned status {status} (no data) for {url}"
            ),
            SetupError::ApiTransport(msg) => write!(f, "Feature API request failed: {msg}"),
            SetupError::Engine(msg) => write!(f, "Rasterisation failed: {msg}"),
            SetupError::MissingArtifact(path) => write!(
                f,
                "Rasterisation produced no output at {}",
                path.display()
            ),
            SetupError::Io(e) => write!(f, "I/O error: {e}"),
            SetupError::Csv(msg) => write!(f, "CSV error: {msg}"),
            SetupError::Json(msg) => write!(f, "JSON error: {msg}"),
            SetupError::UnsupportedFormat(path) => write!(
                f,
                "Unsupported vector format: {}",
                path.display()
            ),
            SetupError::MalformedInput(msg) => write!(f, "Malformed input: {msg}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SetupError {
    fn from(e: std::io::Error) -> Self {
        SetupError::Io(e)
    }
}

impl From<csv::Error> for SetupError {
    fn from(e: csv::Error) -> Self {
        SetupError::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for SetupError {
    fn from(e: serde_json::Error) -> Self {
        SetupError::Json(e.to_string())
    }
}

impl From<walkdir::Error> for SetupError {
    fn from(e: walkdir::Error) -> Self {
        match e.into_io_error() {
            Some(io) => SetupError::Io(io),
            None => SetupError::Io(std::io::Error::other("filesystem loop during scan")),
        }
    }
}
