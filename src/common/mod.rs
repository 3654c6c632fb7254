//! Shared plumbing
//!
//! Configuration loading and the collaborator traits the round engine is
//! written against.

pub mod config;
pub mod traits;
