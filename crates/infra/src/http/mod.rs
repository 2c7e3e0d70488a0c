//! HTTP client implementations

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
