//! Comms layer: external I/O channels over the shared [`CommsState`].

mod state;
#[cfg(feature = "channel-axum")]
pub mod axum_channel;

pub use state::{CommsState, DEFAULT_CONVERSATION};
