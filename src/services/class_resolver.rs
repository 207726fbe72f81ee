use crate::error::{HideError, Result};
use crate::events::{WindowClass, WindowId};
use crate::services::gateway::{Gateway, WellKnownProperty};
use std::sync::Arc;

/// Looks up the `WM_CLASS` names of a window.
pub struct ClassResolver {
    gateway: Arc<dyn Gateway>,
}

impl ClassResolver {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Any failure is reported as [`HideError::Resolve`] for `window`; callers
    /// skip the window and keep going.
    pub fn resolve(&self, window: WindowId) -> Result<WindowClass> {
        let raw = self
            .gateway
            .get_property(window, WellKnownProperty::WmClass)
            .map_err(|err| HideError::resolve(window, err))?;

        Ok(WindowClass::from_property(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::DryRunGateway;

    #[test]
    fn test_resolve_returns_names_in_order() {
        let gateway = Arc::new(DryRunGateway::new().window(10, &["xterm", "XTerm"]));
        let resolver = ClassResolver::new(gateway);

        let class = resolver.resolve(10).expect("class should resolve");
        assert_eq!(class, WindowClass::new(["xterm", "XTerm"]));
    }

    #[test]
    fn test_resolve_window_without_class() {
        let gateway = Arc::new(DryRunGateway::new().bare_window(12));
        let resolver = ClassResolver::new(gateway);

        assert!(resolver.resolve(12).expect("empty class").is_empty());
    }

    #[test]
    fn test_resolve_failure_names_window() {
        let gateway = Arc::new(DryRunGateway::new().unreadable_window(30));
        let resolver = ClassResolver::new(gateway);

        match resolver.resolve(30) {
            Err(HideError::Resolve { window, .. }) => assert_eq!(window, 30),
            other => panic!("expected resolve error, got {:?}", other),
        }
        assert!(matches!(
            resolver.resolve(31),
            Err(HideError::Resolve { window: 31, .. })
        ));
    }
}
