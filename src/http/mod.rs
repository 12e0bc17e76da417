//! HTTP protocol layer module
//!
//! Request context, query decoding and response builders shared by the
//! middlewares and handlers.

pub mod query;
pub mod request;
pub mod response;

pub use query::{parse_query, percent_decode};
pub use request::RequestContext;
pub use response::HttpResponse;
