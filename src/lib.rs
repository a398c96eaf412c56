pub mod aggregate;
pub mod args;
pub mod classify;
pub mod commands;
mod config;
mod db;
mod error;
pub mod model;
pub mod reconcile;
mod utils;

pub use config::Config;
pub use error::Error;
pub use error::Result;
