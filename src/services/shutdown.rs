use crate::events::Xid;
use crate::services::gateway::Gateway;
use crate::services::registry::{HiddenRegistry, RestoreOutcome};
use std::io;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

/// Remaps everything in `registry` through `gateway` and logs the result.
///
/// Shared by the interrupt path and the end-of-stream path of the event loop.
pub fn restore_hidden(registry: &HiddenRegistry, gateway: &dyn Gateway) -> Vec<RestoreOutcome> {
    // Empty once a pass has already run, whichever path ran it
    let outcomes = registry.restore_all(|window| gateway.map_window(window));

    let mut failed = 0;
    for (window, result) in &outcomes {
        match result {
            Ok(()) => info!(window = %Xid(*window), "Window mapped"),
            Err(err) => {
                failed += 1;
                warn!(window = %Xid(*window), "Cannot map window: {}", err);
            }
        }
    }

    if outcomes.is_empty() {
        info!("No hidden windows to restore");
    } else {
        info!(
            restored = outcomes.len() - failed,
            failed, "Restore pass finished"
        );
    }

    outcomes
}

/// Restores hidden windows and closes the connection when the process is
/// interrupted.
pub struct ShutdownHandler {
    registry: Arc<HiddenRegistry>,
    gateway: Arc<dyn Gateway>,
}

impl ShutdownHandler {
    pub fn new(registry: Arc<HiddenRegistry>, gateway: Arc<dyn Gateway>) -> Self {
        Self { registry, gateway }
    }

    /// Waits for the registry lock if the event loop holds it, restores every
    /// hidden window, then closes the gateway. The caller exits afterwards.
    pub fn shutdown(&self) -> Vec<RestoreOutcome> {
        let outcomes = restore_hidden(&self.registry, self.gateway.as_ref());
        // Remaps first, then close; closing wakes a blocked event loop
        self.gateway.close();
        outcomes
    }
}

/// SIGINT and SIGTERM listeners, registered as soon as this is created.
pub struct Interrupts {
    sigint: Signal,
    sigterm: Signal,
}

impl Interrupts {
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves with the name of the first signal received.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::DryRunGateway;

    #[test]
    fn test_shutdown_restores_in_order_and_closes() {
        let dry = Arc::new(
            DryRunGateway::new()
                .window(10, &["xterm"])
                .window(20, &["xterm"]),
        );
        let registry = Arc::new(HiddenRegistry::new());
        registry.add(10);
        registry.add(20);

        let handler = ShutdownHandler::new(registry.clone(), dry.clone());
        let outcomes = handler.shutdown();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(dry.mapped_requests(), vec![10, 20]);
        assert!(dry.is_mapped(10) && dry.is_mapped(20));
        assert!(registry.is_empty());
        assert!(dry.is_closed());
    }

    #[test]
    fn test_failed_remap_stays_registered() {
        let dry = Arc::new(
            DryRunGateway::new()
                .window(10, &["xterm"])
                .window(20, &["xterm"])
                .failing_map(10),
        );
        let registry = HiddenRegistry::new();
        registry.add(10);
        registry.add(20);

        let outcomes = restore_hidden(&registry, dry.as_ref());

        assert!(outcomes[0].1.is_err());
        assert!(outcomes[1].1.is_ok());
        assert_eq!(registry.snapshot(), vec![10]);
        assert_eq!(dry.map_count(10), 1);
        assert_eq!(dry.map_count(20), 1);
    }

    #[test]
    fn test_interrupt_after_stream_end_does_not_retry_failed_remap() {
        let dry = Arc::new(DryRunGateway::new().window(10, &["xterm"]).failing_map(10));
        let registry = Arc::new(HiddenRegistry::new());
        registry.add(10);

        // End-of-stream pass first, then the interrupt handler
        let first = restore_hidden(&registry, dry.as_ref());
        let handler = ShutdownHandler::new(registry.clone(), dry.clone());
        let second = handler.shutdown();

        assert!(first[0].1.is_err());
        assert!(second.is_empty());
        assert_eq!(dry.map_count(10), 1);
        assert_eq!(registry.snapshot(), vec![10]);
        assert!(dry.is_closed());
    }

    #[test]
    fn test_second_shutdown_does_nothing() {
        let dry = Arc::new(DryRunGateway::new().window(10, &["xterm"]));
        let registry = Arc::new(HiddenRegistry::new());
        registry.add(10);

        let handler = ShutdownHandler::new(registry, dry.clone());
        handler.shutdown();
        let outcomes = handler.shutdown();

        assert!(outcomes.is_empty());
        assert_eq!(dry.map_count(10), 1);
    }
}
