//! HTTP protocol layer module
//!
//! Response builders, the body type shared by direct and relayed responses,
//! and cross-origin header handling. Decoupled from request routing.

pub mod cors;
pub mod response;

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;

/// Error type carried by response bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every response this server emits: either a small fixed buffer
/// or the upstream byte stream
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Wrap a fixed buffer as a response body
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Zero-length response body
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

// Re-export commonly used types
pub use cors::CorsPolicy;
pub use response::{
    build_403_response, build_404_response, build_405_response, build_502_response,
    build_preflight_forbidden_response, build_preflight_response,
};
