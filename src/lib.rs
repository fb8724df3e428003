pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod groups;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod resolver;
pub mod runtime;
pub mod tempfiles;
pub mod watcher;
pub mod web;
