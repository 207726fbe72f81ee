//! In-memory stand-in for an X server.
//!
//! Used by `--dry-run` to exercise the whole agent without a display, and by
//! the unit tests, which inspect the recorded requests.

use crate::error::{HideError, Result, WindowOp};
use crate::events::{Delivery, GatewayEvent, WindowId};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::info;

use super::r#trait::{Gateway, WellKnownProperty};

pub const DRY_RUN_ROOT: WindowId = 0x1e3;

/// A request as seen by the fake server, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    SelectStructureEvents(WindowId),
    GetProperty(WindowId, WellKnownProperty),
    Unmap(WindowId),
    Map(WindowId),
}

#[derive(Debug, Default)]
struct FakeWindow {
    class: Option<Vec<u8>>,
    unreadable: bool,
    mapped: bool,
    fail_unmap: bool,
    fail_map: bool,
}

#[derive(Debug, Default)]
struct ServerState {
    windows: HashMap<WindowId, FakeWindow>,
    client_list: Vec<WindowId>,
    script: VecDeque<Delivery>,
    requests: Vec<Request>,
    hold_open: bool,
    closed: bool,
}

pub struct DryRunGateway {
    state: Mutex<ServerState>,
    wakeup: Condvar,
    interval: Option<Duration>,
}

impl Default for DryRunGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            wakeup: Condvar::new(),
            interval: None,
        }
    }

    /// Seeded server for `--dry-run`: two windows mapped before start, then a
    /// scripted burst of notifications, then silence until closed.
    pub fn demo(target_class: &str, interval: Duration) -> Self {
        let target = [target_class.to_lowercase(), target_class.to_string()];
        let gateway = Self::new()
            .with_interval(interval)
            .window(0x0120_0001, &target)
            .window(0x0140_0001, &["firefox", "Firefox"])
            .client_list(&[0x0120_0001, 0x0140_0001])
            .window(0x0160_0001, &target)
            .window(0x0180_0001, &["emacs", "Emacs"])
            .unreadable_window(0x01a0_0001)
            .map_notify(0x0160_0001)
            .map_notify(0x0180_0001)
            .server_error("BadWindow (dry-run)")
            .map_notify(0x01a0_0001)
            .other_event()
            .hold_open();

        {
            let mut state = gateway.state.lock();
            for window in [0x0120_0001, 0x0140_0001] {
                if let Some(fake) = state.windows.get_mut(&window) {
                    fake.mapped = true;
                }
            }
        }

        info!(
            "Dry-run X server seeded with {} windows",
            gateway.state.lock().windows.len()
        );
        gateway
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn window<S: AsRef<str>>(self, window: WindowId, names: &[S]) -> Self {
        let mut raw = Vec::new();
        for name in names {
            raw.extend_from_slice(name.as_ref().as_bytes());
            raw.push(0);
        }
        self.window_with_raw_class(window, raw)
    }

    pub fn window_with_raw_class(self, window: WindowId, raw: Vec<u8>) -> Self {
        self.state.lock().windows.entry(window).or_default().class = Some(raw);
        self
    }

    pub fn client_list(self, windows: &[WindowId]) -> Self {
        self.state.lock().client_list = windows.to_vec();
        self
    }

    pub fn map_notify(self, window: WindowId) -> Self {
        self.push(Delivery::Event(GatewayEvent::MapNotify { window }))
    }

    pub fn other_event(self) -> Self {
        self.push(Delivery::Event(GatewayEvent::Other))
    }

    pub fn server_error(self, message: &str) -> Self {
        self.push(Delivery::Error(message.to_string()))
    }

    /// Keep the stream open after the script runs out, until `close`.
    pub fn hold_open(self) -> Self {
        self.state.lock().hold_open = true;
        self
    }

    fn push(self, delivery: Delivery) -> Self {
        self.state.lock().script.push_back(delivery);
        self
    }

    fn set_mapped(&self, window: WindowId, op: WindowOp, mapped: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.requests.push(match op {
            WindowOp::Map => Request::Map(window),
            WindowOp::Unmap => Request::Unmap(window),
        });

        let fake = state
            .windows
            .get_mut(&window)
            .ok_or_else(|| HideError::operation(window, op, "BadWindow"))?;

        let failing = match op {
            WindowOp::Map => fake.fail_map,
            WindowOp::Unmap => fake.fail_unmap,
        };
        if failing {
            return Err(HideError::operation(window, op, "request rejected"));
        }

        fake.mapped = mapped;
        Ok(())
    }
}

// Failure injection and inspection, mostly for tests.
#[allow(dead_code)]
impl DryRunGateway {
    /// A window without a `WM_CLASS` property.
    pub fn bare_window(self, window: WindowId) -> Self {
        self.state.lock().windows.entry(window).or_default();
        self
    }

    /// A window whose `WM_CLASS` cannot be read.
    pub fn unreadable_window(self, window: WindowId) -> Self {
        self.state.lock().windows.entry(window).or_default().unreadable = true;
        self
    }

    pub fn failing_unmap(self, window: WindowId) -> Self {
        self.state.lock().windows.entry(window).or_default().fail_unmap = true;
        self
    }

    pub fn failing_map(self, window: WindowId) -> Self {
        self.state.lock().windows.entry(window).or_default().fail_map = true;
        self
    }

    /// Appends a delivery to a running server and wakes a blocked waiter.
    pub fn inject(&self, delivery: Delivery) {
        self.state.lock().script.push_back(delivery);
        self.wakeup.notify_all();
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    pub fn unmap_count(&self, window: WindowId) -> usize {
        self.count(Request::Unmap(window))
    }

    pub fn map_count(&self, window: WindowId) -> usize {
        self.count(Request::Map(window))
    }

    /// Windows the server was asked to map, in request order.
    pub fn mapped_requests(&self) -> Vec<WindowId> {
        self.state
            .lock()
            .requests
            .iter()
            .filter_map(|request| match request {
                Request::Map(window) => Some(*window),
                _ => None,
            })
            .collect()
    }

    pub fn is_mapped(&self, window: WindowId) -> bool {
        self.state
            .lock()
            .windows
            .get(&window)
            .map_or(false, |fake| fake.mapped)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn count(&self, wanted: Request) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| **request == wanted)
            .count()
    }
}

impl Gateway for DryRunGateway {
    fn root_window(&self) -> WindowId {
        DRY_RUN_ROOT
    }

    fn select_structure_events(&self, window: WindowId) -> Result<()> {
        self.state
            .lock()
            .requests
            .push(Request::SelectStructureEvents(window));
        Ok(())
    }

    fn wait_for_event(&self) -> Delivery {
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }

        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Delivery::Closed;
            }

            if let Some(delivery) = state.script.pop_front() {
                if let Delivery::Event(GatewayEvent::MapNotify { window }) = delivery {
                    if let Some(fake) = state.windows.get_mut(&window) {
                        fake.mapped = true;
                    }
                }
                return delivery;
            }

            if !state.hold_open {
                return Delivery::Closed;
            }

            self.wakeup.wait(&mut state);
        }
    }

    fn get_property(&self, window: WindowId, property: WellKnownProperty) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.requests.push(Request::GetProperty(window, property));

        match property {
            WellKnownProperty::NetClientList if window == DRY_RUN_ROOT => Ok(state
                .client_list
                .iter()
                .flat_map(|id| id.to_ne_bytes())
                .collect()),
            WellKnownProperty::NetClientList => Ok(Vec::new()),
            WellKnownProperty::WmClass => {
                let fake = state
                    .windows
                    .get(&window)
                    .ok_or(HideError::NoSuchWindow(window))?;

                if fake.unreadable {
                    return Err(HideError::MalformedProperty {
                        window,
                        property: property.name(),
                        reason: "expected format 8, got 32".to_string(),
                    });
                }

                Ok(fake.class.clone().unwrap_or_default())
            }
        }
    }

    fn unmap_window(&self, window: WindowId) -> Result<()> {
        self.set_mapped(window, WindowOp::Unmap, false)
    }

    fn map_window(&self, window: WindowId) -> Result<()> {
        self.set_mapped(window, WindowOp::Map, true)
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.wakeup.notify_all();
    }
}
