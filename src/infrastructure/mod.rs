//! Concrete collaborator implementations behind the port traits.

pub mod http2;

pub use http2::{Http2Channel, Http2ChannelConfig};
