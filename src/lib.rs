pub mod api;
pub mod args;
pub mod bot;
pub mod commands;
pub mod config;
mod error;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod tasks;
mod utils;
pub mod whitelist;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use error::{error_type, Error, ErrorType, Result};
