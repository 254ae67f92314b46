// Library interface for newsdigest modules
// This allows tests and the binary to import modules

pub mod aggregator;
pub mod auth;
pub mod categories;
pub mod extract;
pub mod feeds;
pub mod llm;
pub mod models;
pub mod server;
pub mod store;
pub mod summarize;
pub mod text;
