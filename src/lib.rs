//! Generated product image caching and partner API health probing.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
