//! Request-handling helpers shared across the pipeline.
//!
//! - [`client_ip`] - client IP resolution (socket peer or trusted proxy headers)
//! - [`form`] - urlencoded query/body decoding into JSON-shaped values

pub mod client_ip;
pub mod form;
