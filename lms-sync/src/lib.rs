pub mod auth;
pub mod cli;
pub mod client;
pub mod load_config;
pub mod multipart;

pub use cli::{run, Cli, Commands};
