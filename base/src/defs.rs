use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadOperation,
    IoError,
    MalformedData,
    MissingGeometry,
    NoFrameAvailable,
    SubsystemUnavailable,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn new(kind: ErrorKind, description: String) -> Self {
        Self { kind, description }
    }

    /// Soft errors leave all state untouched and may succeed on a later try.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::NoFrameAvailable
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{:?}: {}", self.kind, self.description)
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::IoError, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait IntoResult<T>: Sized {
    /// Maps a foreign error to `MalformedData` with a description.
    fn res<F: FnOnce() -> String>(self, desc: F) -> Result<T> {
        self.res_as(ErrorKind::MalformedData, desc)
    }

    fn res_as<F: FnOnce() -> String>(self, kind: ErrorKind, desc: F) -> Result<T>;
}

impl<T, E: Display> IntoResult<T> for std::result::Result<T, E> {
    fn res_as<F: FnOnce() -> String>(self, kind: ErrorKind, desc: F) -> Result<T> {
        self.map_err(|err| Error::new(kind, format!("{}: {}", desc(), err)))
    }
}
