//! Certgate - remembered TLS trust decisions for a self-hosted panel server.

pub mod alias;
pub mod cert;
pub mod cli;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod init;
pub mod notify;
pub mod store;
pub mod subsystem;
pub mod trust;

pub use error::{Result, TrustError};
pub use subsystem::TrustSubsystem;
