//! # pins-renderer
//!
//! Turns a pinned [`SourceMessage`](pins_core::SourceMessage) into the post
//! that gets mirrored into the pins channel.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pins_core::SourceMessage;
//! use pins_renderer::{render, SenderIdentity, WebhookPayload};
//!
//! fn payload_for(message: &SourceMessage, bot: &SenderIdentity) -> String {
//!     let post = render(message);
//!     serde_json::to_string(&WebhookPayload::new(&post, bot)).unwrap_or_default()
//! }
//! ```

pub mod engine;
pub mod payload;

pub use engine::{render, RenderedPost, DESCRIPTION_LIMIT};
pub use payload::{SenderIdentity, WebhookPayload};
