use std::fmt;
use std::io;

use crate::entropy::HardwareSource;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// No hardware RNG instruction this process is allowed to use.
    Unsupported(String),
    /// At least one word of a batch could not be extracted within its retry budget.
    Exhausted {
        source: HardwareSource,
        failed: usize,
        words: usize,
        retries: u32,
    },
    InvalidArgs(String),
}

impl Error {
    /// Structural failures mean the hardware RNG itself cannot be trusted to
    /// supply entropy. They terminate the process and are never retried.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Unsupported(_) | Error::Exhausted { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Unsupported(msg) => write!(f, "unsupported hardware: {}", msg),
            Error::Exhausted {
                source,
                failed,
                words,
                retries,
            } => write!(
                f,
                "{} failed {} of {} words after {} retries each",
                source, failed, words, retries
            ),
            Error::InvalidArgs(msg) => write!(f, "invalid arguments: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
