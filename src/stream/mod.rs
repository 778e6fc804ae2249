//! Incremental decoding of the newline-delimited JSON run stream.
//!
//! Chunks from the transport go through [`LineFramer`] to become lines,
//! then [`decode`] turns each line into a [`StreamMessage`] or drops it.

mod decoder;
mod framer;
mod types;

pub use decoder::decode;
pub use framer::LineFramer;
pub use types::{StreamMessage, UpdateRecord};
