use crate::events::WindowId;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HideError {
    #[error("Cannot connect to the X server: {0}")]
    Connection(#[from] x11rb::errors::ConnectError),

    #[error("X connection failed: {0}")]
    Transport(#[from] x11rb::errors::ConnectionError),

    #[error("X request failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Property {property} of window {window:#x} is malformed: {reason}")]
    MalformedProperty {
        window: WindowId,
        property: &'static str,
        reason: String,
    },

    #[error("Cannot resolve class of window {window:#x}: {source}")]
    Resolve {
        window: WindowId,
        #[source]
        source: Box<HideError>,
    },

    #[error("Cannot {op} window {window:#x}: {reason}")]
    Operation {
        window: WindowId,
        op: WindowOp,
        reason: String,
    },

    #[error("No such window: {0:#x}")]
    NoSuchWindow(WindowId),
}

impl HideError {
    pub fn resolve(window: WindowId, source: HideError) -> Self {
        HideError::Resolve {
            window,
            source: Box::new(source),
        }
    }

    pub fn operation(window: WindowId, op: WindowOp, reason: impl fmt::Display) -> Self {
        HideError::Operation {
            window,
            op,
            reason: reason.to_string(),
        }
    }
}

impl From<figment::Error> for HideError {
    fn from(err: figment::Error) -> Self {
        HideError::Config(Box::new(err))
    }
}

/// Window requests whose failure is reported per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    Map,
    Unmap,
}

impl fmt::Display for WindowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowOp::Map => f.write_str("map"),
            WindowOp::Unmap => f.write_str("unmap"),
        }
    }
}

pub type Result<T> = std::result::Result<T, HideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_names_window_in_hex() {
        let err = HideError::operation(0x1a, WindowOp::Unmap, "BadWindow");
        assert_eq!(err.to_string(), "Cannot unmap window 0x1a: BadWindow");
    }

    #[test]
    fn test_resolve_error_keeps_source() {
        let err = HideError::resolve(0x30, HideError::NoSuchWindow(0x30));
        assert!(err.to_string().contains("0x30"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
