pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;

pub use client::{InMemoryNifi, NifiApi, RestClient};
pub use config::{AppConfig, GitConfig, GitProvider, NifiConfig};
pub use error::{NifiError, Result};

// Export all model types
pub use model::*;
