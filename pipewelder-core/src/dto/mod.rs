//! Data Transfer Objects for the scheduling control plane
//!
//! This module contains the JSON shapes exchanged with the remote
//! scheduling service, and the translation from the local template into
//! that encoding.

pub mod definition;
pub mod pipeline;
pub mod validation;
