//! Conduit Core
//!
//! Core types and abstractions for the Conduit pipeline controller.
//!
//! This crate contains:
//! - Documents: the generic resource shape exchanged with the store
//! - Domain types: typed resources (PipelineInvocation, Pipeline, FunctionInvocation)
//!   and the service declarations an invocation provisions

pub mod api;
pub mod document;
pub mod domain;
pub mod error;

pub use document::{Document, Object, ObjectMeta, OwnerReference, ResourceSpec};
pub use error::{Error, Result};
