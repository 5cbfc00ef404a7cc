// Library exports for Kapilya
// This allows integration tests and embedding applications to use the
// client, services and fallback store directly.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod feed;
pub mod gateway;
pub mod services;

pub use client::Client;
pub use error::{AppResult, Error};
