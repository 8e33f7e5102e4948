pub mod api;
pub mod cli;
pub mod error;
pub mod github;
pub mod load_config;
pub mod server;
pub mod submit;

pub use cli::{run, Cli, Commands};
