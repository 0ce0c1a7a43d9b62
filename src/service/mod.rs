//! Service layer: domain operations orchestrating persistence and fan-out.

pub mod chat_service;

pub use chat_service::{CATEGORY_IDS, ChatService};
