// Discord layer - commands, event handlers, and the gateway adapter.

#[path = "moderation/mod.rs"]
pub mod moderation;

// Re-export command types for convenience
pub use moderation::commands::{Data, Error};
