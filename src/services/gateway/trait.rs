use crate::config::Config;
use crate::error::Result;
use crate::events::{Delivery, WindowId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Properties the agent reads from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownProperty {
    /// Per-window instance and class names (8-bit string list).
    WmClass,
    /// Root-window list of managed top-level windows (32-bit window list).
    NetClientList,
}

impl WellKnownProperty {
    pub fn name(self) -> &'static str {
        match self {
            WellKnownProperty::WmClass => "WM_CLASS",
            WellKnownProperty::NetClientList => "_NET_CLIENT_LIST",
        }
    }

    /// Item width in bits the property is expected to carry.
    pub fn format(self) -> u8 {
        match self {
            WellKnownProperty::WmClass => 8,
            WellKnownProperty::NetClientList => 32,
        }
    }
}

impl fmt::Display for WellKnownProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capabilities the hiding core needs from a windowing-server connection.
///
/// All calls may block. Implementations must tolerate `wait_for_event` blocking
/// on one thread while requests are issued from another.
pub trait Gateway: Send + Sync {
    fn root_window(&self) -> WindowId;

    /// Subscribes to structural change notifications on `window`.
    fn select_structure_events(&self, window: WindowId) -> Result<()>;

    fn wait_for_event(&self) -> Delivery;

    /// Raw property value; an absent property yields an empty value.
    fn get_property(&self, window: WindowId, property: WellKnownProperty) -> Result<Vec<u8>>;

    fn unmap_window(&self, window: WindowId) -> Result<()>;

    fn map_window(&self, window: WindowId) -> Result<()>;

    /// Ends the event stream. A thread blocked in `wait_for_event` wakes up
    /// with [`Delivery::Closed`], and so does every later wait.
    fn close(&self);
}

/// Factory function to create the gateway for the configured mode
pub fn create_gateway(config: &Config, dry_run: bool) -> Result<Arc<dyn Gateway>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunGateway::demo(
            &config.target_class,
            Duration::from_secs(2),
        )))
    } else {
        Ok(Arc::new(super::x11::X11Gateway::connect(
            config.display.as_deref(),
        )?))
    }
}

/// Decodes a 32-bit window list property as delivered by the server.
pub fn decode_window_list(raw: &[u8]) -> Vec<WindowId> {
    raw.chunks_exact(4)
        .map(|chunk| WindowId::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
