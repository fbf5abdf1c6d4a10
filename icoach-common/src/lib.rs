//! # iCoach Common Library
//!
//! Shared code for the iCoach interview services:
//! - Error type
//! - Bootstrap configuration (TOML)
//! - Domain models (questions, analysis readings, scores, session records)
//! - Wire protocol for the live interview socket

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
