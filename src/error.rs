use std::fmt::{self, Debug, Display};
use std::io;

use crate::interaction::InteractionId;

/// Errors reported by the configuration, context, report and runner layers.
///
/// The samplers and scoring functions in [`crate::exposure`] never return
/// errors; invalid parameters there surface as NaN.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum ExposureError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    IllegalGlobalPropertyValue(String),
    UnknownGlobalProperty(String),
    GlobalPropertyAlreadySet(String),
    MissingParameters(&'static str),
    UnknownInteraction(InteractionId),
    ReportError(String),
    ExposureError(String),
}

impl From<io::Error> for ExposureError {
    fn from(error: io::Error) -> Self {
        ExposureError::IoError(error)
    }
}

impl From<serde_json::Error> for ExposureError {
    fn from(error: serde_json::Error) -> Self {
        ExposureError::JsonError(error)
    }
}

impl From<csv::Error> for ExposureError {
    fn from(error: csv::Error) -> Self {
        ExposureError::CsvError(error)
    }
}

impl From<String> for ExposureError {
    fn from(error: String) -> Self {
        ExposureError::ExposureError(error)
    }
}

impl From<&str> for ExposureError {
    fn from(error: &str) -> Self {
        ExposureError::ExposureError(error.to_string())
    }
}

impl std::error::Error for ExposureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExposureError::IoError(error) => Some(error),
            ExposureError::JsonError(error) => Some(error),
            ExposureError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for ExposureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExposureError::IoError(error) => write!(f, "I/O error: {error}"),
            ExposureError::JsonError(error) => write!(f, "JSON error: {error}"),
            ExposureError::CsvError(error) => write!(f, "CSV error: {error}"),
            ExposureError::IllegalGlobalPropertyValue(message) => {
                write!(f, "Illegal global property value: {message}")
            }
            ExposureError::UnknownGlobalProperty(name) => {
                write!(f, "No global property registered as {name}")
            }
            ExposureError::GlobalPropertyAlreadySet(name) => {
                write!(f, "Global property {name} is already set to a different value")
            }
            ExposureError::MissingParameters(name) => {
                write!(f, "Global property {name} must be set before sampling exposures")
            }
            ExposureError::UnknownInteraction(id) => {
                write!(f, "Interaction {id:?} does not exist or has left the window")
            }
            ExposureError::ReportError(message) => write!(f, "Report error: {message}"),
            ExposureError::ExposureError(message) => write!(f, "Error: {message}"),
        }
    }
}
