//! Adapter for the review backend: request/response calls and the live
//! push channel.

pub mod api;
pub mod stream;

pub use api::{ApiClient, ConsoleSubmission};
pub use stream::{apply_frame, ChannelFrame, ChannelStatus, LiveChannel, Subscription};
