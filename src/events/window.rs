use smallvec::SmallVec;
use std::fmt;

/// Server-side window identifier.
pub type WindowId = u32;

/// Displays a window id the way X tools print it (`0x1a00003`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xid(pub WindowId);

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Instance and class names of a window, as reported by `WM_CLASS`.
///
/// Names are kept as the raw bytes the client stored; they are compared byte
/// for byte with the target and only decoded for display. Order is kept for
/// display only; matching is plain membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WindowClass {
    names: SmallVec<[Vec<u8>; 2]>,
}

impl WindowClass {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            names: names.into_iter().map(|name| name.as_ref().to_vec()).collect(),
        }
    }

    /// Splits a raw `WM_CLASS` value: NUL-separated names with a trailing NUL
    /// terminator.
    pub fn from_property(raw: &[u8]) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        let body = raw.strip_suffix(b"\0").unwrap_or(raw);
        Self::new(body.split(|&b| b == 0))
    }

    pub fn matches(&self, target: &str) -> bool {
        let target = target.as_bytes();
        self.names.iter().any(|name| name.as_slice() == target)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for WindowClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\"", String::from_utf8_lossy(name))?;
        }
        write!(f, "]")
    }
}

/// Notification delivered by the protocol gateway, reduced to what the
/// dispatcher distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent {
    MapNotify { window: WindowId },
    Other,
}

/// Result of one wait on the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(GatewayEvent),
    /// An error reported by the server on the event stream; the connection
    /// itself is still usable.
    Error(String),
    /// The stream ended: no event and no error will ever follow.
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_property_strips_terminator() {
        let class = WindowClass::from_property(b"xterm\0XTerm\0");
        assert_eq!(class, WindowClass::new(["xterm", "XTerm"]));
    }

    #[test]
    fn test_from_property_empty_value() {
        assert!(WindowClass::from_property(b"").is_empty());
        assert_eq!(WindowClass::from_property(b"\0"), WindowClass::new([""]));
    }

    #[test]
    fn test_from_property_without_terminator_keeps_last_name() {
        let class = WindowClass::from_property(b"xterm\0XTerm");
        assert_eq!(class, WindowClass::new(["xterm", "XTerm"]));
    }

    #[test]
    fn test_non_ascii_names_compare_byte_for_byte() {
        let class = WindowClass::from_property("café\0Café\0".as_bytes());
        assert!(class.matches("café"));
        assert!(class.matches("Café"));

        // Same text in Latin-1 is a different byte sequence.
        let latin1 = WindowClass::from_property(b"caf\xe9\0");
        assert!(!latin1.matches("café"));
        assert_eq!(latin1.to_string(), "[\"caf\u{fffd}\"]");
    }

    #[test]
    fn test_matches_any_name_exactly() {
        let class = WindowClass::new(["xterm", "XTerm"]);
        assert!(class.matches("xterm"));
        assert!(class.matches("XTerm"));
        assert!(!class.matches("xter"));
        assert!(!class.matches("XTERM"));
    }

    #[test]
    fn test_display_lists_names() {
        let class = WindowClass::new(["firefox", "Firefox"]);
        assert_eq!(class.to_string(), "[\"firefox\", \"Firefox\"]");
    }
}
