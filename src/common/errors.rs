use log::error;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single colorization job or workspace operation.
#[derive(Debug, Error)]
pub enum JobError {
    /// Bad path, extension, token or name supplied by the caller.
    #[error("{0}")]
    Usage(String),

    #[error("source image not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("I/O failure on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The colorization capability (or the codec feeding it) failed. Never retried.
    #[error("colorization failed")]
    Adapter(#[source] anyhow::Error),
}

impl JobError {
    pub fn usage(message: impl Into<String>) -> Self {
        JobError::Usage(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Log an error together with its full cause chain and hand it back.
pub fn handle_error(error: anyhow::Error) -> anyhow::Error {
    error!("{:?}", error);
    error
}

/// Render an error and all of its sources on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
