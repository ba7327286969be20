use std::{error::Error as StdError, fmt, io};

#[derive(Debug)]
pub enum Error {
    /// A part's sub-headers could not be parsed. Aborts extraction for the
    /// whole request; nothing already extracted from it is persisted.
    MalformedPart(String),
    /// Startup configuration was invalid (bad address, unreadable response file).
    Config(String),
    Io(io::Error),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedPart(msg.into())
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedPart(ref msg) => write!(f, "Malformed part: {}", msg),
            Error::Config(ref msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Io(ref e) => write!(f, "Io: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(inner: io::Error) -> Self {
        Error::Io(inner)
    }
}
