pub mod window;

pub use window::{Delivery, GatewayEvent, WindowClass, WindowId, Xid};
