//! Keepsake Request Router
//!
//! Receives operation requests from the interactive surface and sends
//! each one to the snapshot store, to a live page collector, or to the
//! database scanner. Every request gets exactly one response carrying
//! the request's id; unknown operations and requests missing their page
//! fail explicitly instead of being dropped.

mod error;
mod message;
mod page;
mod router;

pub use error::RouterError;
pub use message::{OperationKind, Request, Response};
pub use page::{MemoryPages, Page, PageCollector, PageTarget, StorageArea};
pub use router::Router;

pub type Result<T> = std::result::Result<T, RouterError>;
