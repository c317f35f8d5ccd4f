//! Session-level value types shared with the transport adapters.

pub mod stream;

pub use stream::StreamEvent;
