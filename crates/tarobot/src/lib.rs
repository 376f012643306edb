//! tarobot - Tarot card readings from the command line
//!
//! Cards are drawn from a shuffled deck (or named on the command line), laid
//! out in a spread, and handed to a language model for interpretation.
//!
//! - [`cli`] - subcommands generated from the spread registry
//! - [`config`] - TOML configuration with built-in defaults
//! - [`backend`] - generation backends behind the [`backend::Generator`] trait
//! - [`app`] - the reading orchestrator
//! - [`store`] - SQLite history of readings

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod store;

pub use app::App;
pub use config::Config;
