//! Application services: the generated-image workflow and the partner health probe.

pub mod cache_probe;
pub mod display;
pub mod error;
pub mod generated_image;
pub mod generation;
pub mod health;
pub mod ports;
