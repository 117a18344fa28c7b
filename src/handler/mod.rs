//! Request handler module
//!
//! Validates inbound requests and relays the accepted ones to the upstream.

pub mod router;
pub mod upstream;

// Re-export main entry point
pub use router::serve_request;
