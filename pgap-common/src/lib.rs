//! # pgap Common Library
//!
//! Shared code for the perception-gap store:
//! - Entity model (assessments, departments, responses, aggregates)
//! - Identifier and access-code generation
//! - Aggregation engine
//! - Configuration loading
//! - Error types

pub mod aggregation;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod models;
pub mod time;

pub use error::{Error, Result};
