//! In-memory browser for tests and dry runs.
//!
//! [`MockSession`] implements [`Session`](crate::session::Session) over a
//! small arena DOM with shadow roots, frames and windows. Probes are
//! interpreted natively instead of running script. [`AssignmentApp`] scripts
//! the full login-to-results site on top of it.

mod app;
mod css;
mod dom;
mod probes;
mod session;

pub use app::{AppOptions, AssignmentApp, Milestone};
pub use css::SelectorList;
pub use dom::{Document, Node, NodeId, NodeSpec, Overflow, ScrollBox};
pub use session::{MockBehavior, MockSession, MockWindow, NodeAddr, StaticPage, World};
