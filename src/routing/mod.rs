//! Routing module
//!
//! Provides the route table used to dispatch requests:
//! - Path patterns with `:name` parameters
//! - Method-aware lookup with 404/405 distinction

mod pattern;
mod router;

pub use router::{Dispatch, Router};
