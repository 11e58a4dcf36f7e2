//! Core domain types
//!
//! This module contains the structures Pipewelder works with locally:
//! the shared template every pipeline is instantiated from, the per-pipeline
//! value overrides, and the view of remote pipeline state.

pub mod state;
pub mod template;
pub mod values;
