//! Plan Bot: conversational monthly budget planner.

pub mod channels;
pub mod config;
pub mod error;
pub mod planning;
pub mod store;
