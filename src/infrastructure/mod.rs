//! Infrastructure layer: external state backing the pipeline.
//!
//! - [`counter`] - local and Redis counter stores for rate limiting

pub mod counter;
