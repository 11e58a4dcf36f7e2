//! Pipewelder Core
//!
//! Core types and template logic for Pipewelder.
//!
//! This crate contains:
//! - Domain types: the shared template, per-pipeline values, remote state
//! - DTOs: the scheduling control plane's wire encoding
//! - Parameter resolution and schedule normalization
//! - `PipelineInstance`, one instantiation of the template for a directory

pub mod domain;
pub mod dto;
pub mod error;
pub mod instance;
pub mod resolver;
pub mod schedule;

pub use error::{CoreError, Result};
pub use instance::PipelineInstance;
