//! Shorts Moderator: text moderation pipeline for short videos.

pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::ModeratorConfig;
pub use error::{Error, Result};
pub use pipeline::ModerationPipeline;
