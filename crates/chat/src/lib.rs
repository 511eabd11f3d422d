//! `camp-chat`: per-chat runtime state shared between the conversation
//! loop and whoever renders it.

pub mod thinking;

pub use thinking::{ScopeKey, ThinkingState, ThinkingTracker};
