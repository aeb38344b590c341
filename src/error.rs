use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiffCovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Diff parse error at line {line}: {message}")]
    DiffParse { line: usize, message: String },

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Could not parse report '{path}': {message}")]
    ReportParse { path: String, message: String },

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Quality tool not recognized: '{0}'")]
    ToolNotSupported(String),

    #[error("Quality tool not installed: '{0}'")]
    ToolNotInstalled(String),

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DiffCovError {
    /// Attach a report file name to a parse failure raised by an adapter
    /// that only saw the report's bytes.
    pub fn in_report(self, path: &str) -> Self {
        match self {
            DiffCovError::Xml { source, position } => DiffCovError::ReportParse {
                path: path.to_string(),
                message: format!("XML error at position {position}: {source}"),
            },
            DiffCovError::ReportParse { path: p, message } if p.is_empty() => {
                DiffCovError::ReportParse {
                    path: path.to_string(),
                    message,
                }
            }
            DiffCovError::UnknownFormat => DiffCovError::ReportParse {
                path: path.to_string(),
                message: "unsupported root element or leading token".to_string(),
            },
            other => other,
        }
    }

    /// Shorthand for a parse error whose file name is filled in later.
    pub fn report(message: impl Into<String>) -> Self {
        DiffCovError::ReportParse {
            path: String::new(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiffCovError>;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Threshold met
    Success = 0,
    /// Total below `--fail-under`
    ThresholdFailed = 1,
    /// Bad input, configuration or tool failure
    Error = 2,
}

impl From<crate::threshold::Outcome> for ExitCode {
    fn from(outcome: crate::threshold::Outcome) -> Self {
        match outcome {
            crate::threshold::Outcome::Pass => ExitCode::Success,
            crate::threshold::Outcome::Fail => ExitCode::ThresholdFailed,
        }
    }
}
