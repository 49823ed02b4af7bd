// Discord-specific moderation adapters.
// Each file translates between serenity types and the core's domain types.

pub mod commands;
pub mod link_handler;
pub mod serenity_gateway;
