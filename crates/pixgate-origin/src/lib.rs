//! Pixgate Origin Client
//!
//! This crate provides the client for communicating with the upstream
//! image host, handling header shaping and conditional revalidation.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod headers;

pub use client::{OriginClient, OriginClientConfig};
pub use error::FetchError;
pub use fetcher::{FetchOutcome, OriginFetcher, OriginMetadata, Revalidators, UaSelection};
pub use headers::UaPolicy;
