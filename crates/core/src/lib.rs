#![deny(warnings)]

pub mod client;
pub mod config;
pub mod model;
pub mod transport;

pub use client::{LingvanexClient, LingvanexError};
pub use config::{ApiKey, ClientBuilder, ClientConfig};
