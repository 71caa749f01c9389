// Public API for integration tests and the server binary

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fanout;
pub mod locks;
pub mod names;
pub mod notifier;
pub mod origin;
pub mod projection;
pub mod protocol;
pub mod random;
pub mod sanitize;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
