//! Trait seams between the dispatch core and its collaborators.

mod channel;

pub use channel::{ApnsChannel, ChannelFactory, StreamMetrics};
