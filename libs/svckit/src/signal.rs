//! Step outcomes for request handling chains.
//!
//! A handler is written as a sequence of fallible steps joined with `?`.
//! A step that has already written the response returns [`StepError::Terminated`],
//! which travels up the chain like any other error until it reaches
//! [`RequestScope::finish`](crate::RequestScope::finish), where it is recognised
//! and discarded. Every other failure becomes a 500.

use std::fmt;

/// Marker meaning "a response has already been sent, stop processing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Terminated;

impl fmt::Display for Terminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request terminated: response already sent")
    }
}

/// Why a step chain stopped early.
#[derive(Debug)]
pub enum StepError {
    /// The response was written by a terminal helper; nothing left to do.
    Terminated,
    /// Unexpected failure; reported as 500 Internal Server Error.
    Failed(anyhow::Error),
}

impl StepError {
    /// Wraps any error as a step failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(err.into())
    }

    /// Builds a step failure from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::Failed(anyhow::Error::msg(message))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => fmt::Display::fmt(&Terminated, f),
            Self::Failed(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Terminated => None,
            Self::Failed(err) => Some(&**err),
        }
    }
}

impl From<Terminated> for StepError {
    fn from(_: Terminated) -> Self {
        Self::Terminated
    }
}

impl From<anyhow::Error> for StepError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}

/// Result of one step in a handler chain.
pub type StepResult<T = ()> = Result<T, StepError>;
