pub mod class_resolver;
pub mod dispatcher;
pub mod gateway;
pub mod registry;
pub mod shutdown;

pub use dispatcher::Dispatcher;
pub use gateway::create_gateway;
pub use registry::HiddenRegistry;
pub use shutdown::{Interrupts, ShutdownHandler};
