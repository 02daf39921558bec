pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod pivot;
pub mod render;
pub mod session;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::Result;
pub use model::Amount;
