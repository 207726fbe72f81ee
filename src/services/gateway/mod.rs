//! Protocol gateway: the only place that talks to the windowing server.
//!
//! The hiding core sees the server exclusively through the [`Gateway`] trait,
//! so the same dispatcher runs against a live X display or the in-memory
//! dry-run server.

mod dry_run;
mod r#trait;
mod x11;

pub use self::r#trait::{create_gateway, decode_window_list, Gateway, WellKnownProperty};

#[cfg(test)]
pub use self::dry_run::{DryRunGateway, Request, DRY_RUN_ROOT};
