use crate::error::{HideError, Result};
use crate::events::WindowId;
use parking_lot::Mutex;

/// Lifecycle of the hiding agent. `ShuttingDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    ShuttingDown,
}

/// What [`HiddenRegistry::hide_with`] did with a window.
#[derive(Debug)]
pub enum HideOutcome {
    Hidden,
    /// Already registered and mapped again; the unmap was re-sent and the
    /// registry left unchanged.
    Rehidden,
    /// A restore pass has started; no unmap was issued.
    ShuttingDown,
    /// The unmap request failed; the registry was left unchanged.
    Failed(HideError),
}

/// Outcome of one remap attempt during a restore pass.
pub type RestoreOutcome = (WindowId, Result<()>);

#[derive(Debug)]
struct RegistryState {
    hidden: Vec<WindowId>,
    phase: Phase,
}

/// Windows currently unmapped by this process, in hide order.
///
/// Shared between the event loop and the interrupt handler. Every access goes
/// through one mutex, and the phase lives under the same lock so a restore
/// pass and a hide can never interleave.
#[derive(Debug)]
pub struct HiddenRegistry {
    state: Mutex<RegistryState>,
}

impl Default for HiddenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HiddenRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                hidden: Vec::new(),
                phase: Phase::Running,
            }),
        }
    }

    /// Appends `window`; returns `false` if it was already registered.
    #[allow(dead_code)]
    pub fn add(&self, window: WindowId) -> bool {
        let mut state = self.state.lock();
        if state.hidden.contains(&window) {
            return false;
        }
        state.hidden.push(window);
        true
    }

    /// Unmaps and registers `window` as one step under the lock.
    ///
    /// The unmap is always sent while running, even for a window that is
    /// already registered: it was mapped again and must go back into hiding.
    pub fn hide_with<F>(&self, window: WindowId, unmap: F) -> HideOutcome
    where
        F: FnOnce(WindowId) -> Result<()>,
    {
        let mut state = self.state.lock();

        if state.phase == Phase::ShuttingDown {
            return HideOutcome::ShuttingDown;
        }

        if let Err(err) = unmap(window) {
            return HideOutcome::Failed(err);
        }

        if state.hidden.contains(&window) {
            HideOutcome::Rehidden
        } else {
            state.hidden.push(window);
            HideOutcome::Hidden
        }
    }

    /// Remaps every registered window in hide order and switches the phase to
    /// `ShuttingDown`.
    ///
    /// Successfully remapped windows are dropped; failures stay registered and
    /// are reported. Only the first pass does any work, so a failed remap is
    /// never retried.
    pub fn restore_all<F>(&self, mut remap: F) -> Vec<RestoreOutcome>
    where
        F: FnMut(WindowId) -> Result<()>,
    {
        let mut state = self.state.lock();
        if state.phase == Phase::ShuttingDown {
            return Vec::new();
        }
        state.phase = Phase::ShuttingDown;

        let pending = std::mem::take(&mut state.hidden);
        let mut outcomes = Vec::with_capacity(pending.len());

        for window in pending {
            let result = remap(window);
            if result.is_err() {
                state.hidden.push(window);
            }
            outcomes.push((window, result));
        }

        outcomes
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().hidden.is_empty()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.state.lock().hidden.len()
    }

    pub fn snapshot(&self) -> Vec<WindowId> {
        self.state.lock().hidden.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WindowOp;

    #[test]
    fn test_add_rejects_duplicates() {
        let registry = HiddenRegistry::new();
        assert!(registry.add(10));
        assert!(registry.add(20));
        assert!(!registry.add(10));
        assert_eq!(registry.snapshot(), vec![10, 20]);
    }

    #[test]
    fn test_hide_with_registers_only_on_success() {
        let registry = HiddenRegistry::new();

        assert!(matches!(
            registry.hide_with(10, |_| Ok(())),
            HideOutcome::Hidden
        ));
        assert!(matches!(
            registry.hide_with(11, |w| Err(HideError::operation(w, WindowOp::Unmap, "BadWindow"))),
            HideOutcome::Failed(_)
        ));
        assert_eq!(registry.snapshot(), vec![10]);
    }

    #[test]
    fn test_hide_with_unmaps_registered_window_again() {
        let registry = HiddenRegistry::new();
        registry.add(10);

        let mut unmaps = 0;
        let outcome = registry.hide_with(10, |_| {
            unmaps += 1;
            Ok(())
        });

        assert!(matches!(outcome, HideOutcome::Rehidden));
        assert_eq!(unmaps, 1);
        assert_eq!(registry.snapshot(), vec![10]);
    }

    #[test]
    fn test_failed_unmap_keeps_registered_window() {
        let registry = HiddenRegistry::new();
        registry.add(10);

        let outcome =
            registry.hide_with(10, |w| Err(HideError::operation(w, WindowOp::Unmap, "BadWindow")));

        assert!(matches!(outcome, HideOutcome::Failed(_)));
        assert_eq!(registry.snapshot(), vec![10]);
    }

    #[test]
    fn test_restore_all_in_hide_order() {
        let registry = HiddenRegistry::new();
        registry.add(10);
        registry.add(20);

        let mut order = Vec::new();
        let outcomes = registry.restore_all(|w| {
            order.push(w);
            Ok(())
        });

        assert_eq!(order, vec![10, 20]);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, result)| result.is_ok()));
        assert!(registry.is_empty());
        assert_eq!(registry.phase(), Phase::ShuttingDown);
    }

    #[test]
    fn test_restore_all_keeps_failures() {
        let registry = HiddenRegistry::new();
        registry.add(10);
        registry.add(20);
        registry.add(30);

        let outcomes = registry.restore_all(|w| {
            if w == 20 {
                Err(HideError::operation(w, WindowOp::Map, "BadWindow"))
            } else {
                Ok(())
            }
        });

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[1].1.is_err());
        assert_eq!(registry.snapshot(), vec![20]);
    }

    #[test]
    fn test_failed_remap_is_not_retried_by_later_pass() {
        let registry = HiddenRegistry::new();
        registry.add(10);

        let first = registry.restore_all(|w| Err(HideError::operation(w, WindowOp::Map, "BadWindow")));
        assert_eq!(first.len(), 1);

        let mut calls = 0;
        let second = registry.restore_all(|_| {
            calls += 1;
            Ok(())
        });

        assert!(second.is_empty());
        assert_eq!(calls, 0);
        assert_eq!(registry.snapshot(), vec![10]);
    }

    #[test]
    fn test_restore_all_is_idempotent() {
        let registry = HiddenRegistry::new();
        registry.add(10);
        registry.restore_all(|_| Ok(()));

        let mut calls = 0;
        let outcomes = registry.restore_all(|_| {
            calls += 1;
            Ok(())
        });

        assert!(outcomes.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_no_hide_after_restore_started() {
        let registry = HiddenRegistry::new();
        registry.restore_all(|_| Ok(()));

        let mut unmaps = 0;
        let outcome = registry.hide_with(40, |_| {
            unmaps += 1;
            Ok(())
        });

        assert!(matches!(outcome, HideOutcome::ShuttingDown));
        assert_eq!(unmaps, 0);
        assert!(registry.is_empty());
    }
}
