//! Shared helpers

pub mod chunks;
pub mod image;
