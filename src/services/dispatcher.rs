use crate::events::{Delivery, GatewayEvent, WindowId, Xid};
use crate::services::class_resolver::ClassResolver;
use crate::services::gateway::{decode_window_list, Gateway, WellKnownProperty};
use crate::services::registry::{HiddenRegistry, HideOutcome, RestoreOutcome};
use crate::services::shutdown::restore_hidden;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a candidate window came from; only affects log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Prescan,
    MapNotify,
}

impl Origin {
    fn as_str(self) -> &'static str {
        match self {
            Origin::Prescan => "previously spawned",
            Origin::MapNotify => "map notify",
        }
    }
}

/// Event loop that hides every newly mapped window of the target class.
///
/// Events are handled one at a time in delivery order. The loop ends when the
/// gateway reports the end of the stream, after a restore pass.
pub struct Dispatcher {
    gateway: Arc<dyn Gateway>,
    resolver: ClassResolver,
    registry: Arc<HiddenRegistry>,
    target_class: String,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        registry: Arc<HiddenRegistry>,
        target_class: impl Into<String>,
    ) -> Self {
        Self {
            resolver: ClassResolver::new(gateway.clone()),
            gateway,
            registry,
            target_class: target_class.into(),
        }
    }

    /// Applies the hide policy to the windows already listed in the root
    /// window's client list. Returns how many were hidden.
    pub fn prescan(&self, root: WindowId) -> usize {
        let raw = match self
            .gateway
            .get_property(root, WellKnownProperty::NetClientList)
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Cannot read the client list, skipping pre-scan: {}", err);
                return 0;
            }
        };

        let windows = decode_window_list(&raw);
        info!(count = windows.len(), "Pre-scanning mapped windows");

        // A window listed twice is considered once, in first-listed order
        let mut seen = HashSet::with_capacity(windows.len());
        let mut hidden = 0;
        for window in windows {
            if !seen.insert(window) {
                continue;
            }
            if self.consider(window, Origin::Prescan) {
                hidden += 1;
            }
        }
        hidden
    }

    /// Runs until the event stream ends, then restores the hidden windows.
    pub fn run(&self) -> Vec<RestoreOutcome> {
        info!(target_class = %self.target_class, "Watching for new windows");

        // One delivery at a time; nothing is read ahead
        loop {
            let delivery = self.gateway.wait_for_event();
            if self.handle_delivery(delivery).is_break() {
                break;
            }
        }

        info!("Event stream ended, restoring hidden windows");
        restore_hidden(&self.registry, self.gateway.as_ref())
    }

    /// Processes one delivery. `Break` means the stream has ended.
    pub fn handle_delivery(&self, delivery: Delivery) -> ControlFlow<()> {
        match delivery {
            Delivery::Event(GatewayEvent::MapNotify { window }) => {
                self.consider(window, Origin::MapNotify);
                ControlFlow::Continue(())
            }
            Delivery::Event(GatewayEvent::Other) => ControlFlow::Continue(()),
            Delivery::Error(err) => {
                warn!("X server reported an error: {}", err);
                ControlFlow::Continue(())
            }
            Delivery::Closed => ControlFlow::Break(()),
        }
    }

    /// Resolves `window` and hides it when it matches. Returns `true` if the
    /// window was hidden by this call.
    fn consider(&self, window: WindowId, origin: Origin) -> bool {
        // Unreadable class: log and move on, the loop never stops for one window
        let class = match self.resolver.resolve(window) {
            Ok(class) => class,
            Err(err) => {
                warn!(window = %Xid(window), origin = origin.as_str(), "{}; skipping", err);
                return false;
            }
        };

        // Absent WM_CLASS matches nothing
        if class.is_empty() {
            debug!(window = %Xid(window), "Window has no WM_CLASS");
            return false;
        }

        if !class.matches(&self.target_class) {
            debug!(window = %Xid(window), %class, "Window does not match");
            return false;
        }

        // Unmap and register under the registry lock so a restore pass cannot
        // slip in between
        match self
            .registry
            .hide_with(window, |window| self.gateway.unmap_window(window))
        {
            HideOutcome::Hidden => {
                info!(window = %Xid(window), %class, origin = origin.as_str(), "Window unmapped");
                true
            }
            HideOutcome::Rehidden => {
                info!(
                    window = %Xid(window),
                    %class,
                    origin = origin.as_str(),
                    "Hidden window was mapped again; unmapped"
                );
                false
            }
            HideOutcome::ShuttingDown => {
                debug!(window = %Xid(window), "Shutting down; leaving window alone");
                false
            }
            HideOutcome::Failed(err) => {
                warn!(window = %Xid(window), %class, origin = origin.as_str(), "{}", err);
                false
            }
        }
    }
}
