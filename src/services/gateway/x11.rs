use crate::error::{HideError, Result, WindowOp};
use crate::events::{Delivery, GatewayEvent, WindowId};
use std::io;
use std::net::Shutdown;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::cookie::VoidCookie;
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as _, EventMask,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::r#trait::{Gateway, WellKnownProperty};

/// Gateway backed by a real X server connection.
pub struct X11Gateway {
    conn: RustConnection,
    root: WindowId,
    net_client_list: Atom,
    closed: AtomicBool,
}

impl X11Gateway {
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display)?;
        let root = conn.setup().roots[screen_num].root;

        let net_client_list = conn
            .intern_atom(false, WellKnownProperty::NetClientList.name().as_bytes())?
            .reply()?
            .atom;

        info!(
            "Connected to X server, screen {}, root window {:#x}",
            screen_num, root
        );

        Ok(Self {
            conn,
            root,
            net_client_list,
            closed: AtomicBool::new(false),
        })
    }

    fn atom(&self, property: WellKnownProperty) -> Atom {
        match property {
            WellKnownProperty::WmClass => AtomEnum::WM_CLASS.into(),
            WellKnownProperty::NetClientList => self.net_client_list,
        }
    }

    /// Shuts the socket down in both directions so a thread blocked in
    /// `wait_for_event` sees end of stream. Works on a duplicate of the
    /// descriptor; shutdown applies to the socket, not the descriptor.
    fn shutdown_socket(&self) -> io::Result<()> {
        let fd = self.conn.stream().as_fd().try_clone_to_owned()?;
        UnixStream::from(fd).shutdown(Shutdown::Both)
    }

    fn checked(
        &self,
        window: WindowId,
        op: WindowOp,
        request: std::result::Result<VoidCookie<'_, RustConnection>, ConnectionError>,
    ) -> Result<()> {
        request
            .map_err(HideError::from)
            .and_then(|cookie| cookie.check().map_err(HideError::from))
            .map_err(|err| HideError::operation(window, op, err))
    }
}

impl Gateway for X11Gateway {
    fn root_window(&self) -> WindowId {
        self.root
    }

    fn select_structure_events(&self, window: WindowId) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_NOTIFY);
        self.conn.change_window_attributes(window, &aux)?.check()?;
        Ok(())
    }

    fn wait_for_event(&self) -> Delivery {
        if self.closed.load(Ordering::Acquire) {
            return Delivery::Closed;
        }

        match self.conn.wait_for_event() {
            Ok(Event::MapNotify(event)) => Delivery::Event(GatewayEvent::MapNotify {
                window: event.window,
            }),
            Ok(Event::Error(err)) => Delivery::Error(format!("{:?}", err)),
            Ok(_) => Delivery::Event(GatewayEvent::Other),
            Err(err) => {
                debug!("X event stream ended: {}", err);
                Delivery::Closed
            }
        }
    }

    fn get_property(&self, window: WindowId, property: WellKnownProperty) -> Result<Vec<u8>> {
        let reply = self
            .conn
            .get_property(false, window, self.atom(property), AtomEnum::ANY, 0, u32::MAX)?
            .reply()?;

        // Absent property: type NONE, format 0, no data.
        if reply.type_ == u32::from(AtomEnum::NONE) {
            return Ok(Vec::new());
        }

        if reply.format != property.format() {
            return Err(HideError::MalformedProperty {
                window,
                property: property.name(),
                reason: format!(
                    "expected format {}, got {}",
                    property.format(),
                    reply.format
                ),
            });
        }

        Ok(reply.value)
    }

    fn unmap_window(&self, window: WindowId) -> Result<()> {
        self.checked(window, WindowOp::Unmap, self.conn.unmap_window(window))
    }

    fn map_window(&self, window: WindowId) -> Result<()> {
        self.checked(window, WindowOp::Map, self.conn.map_window(window))
    }

    /// Flushes outstanding requests, then shuts the socket down. A blocked
    /// wait fails with a connection error and reports the end of the stream.
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Remap requests from the restore pass must reach the server first
        if let Err(err) = self.conn.flush() {
            warn!("Cannot flush X connection on close: {}", err);
        }
        if let Err(err) = self.shutdown_socket() {
            warn!("Cannot shut down X connection: {}", err);
        }
        debug!("X connection closed");
    }
}
