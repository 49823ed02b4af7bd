// Core moderation module - link-moderation business logic.
// The gateway port is defined here so the engine stays platform-agnostic.

pub mod gateway;
pub mod moderation_models;
pub mod moderation_service;
pub mod sweep_service;

pub use gateway::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use sweep_service::*;
