//! Core domain types
//!
//! Typed resources the controller reads and writes. The invocation is the object
//! being reconciled; pipelines are read-only templates; function invocations and
//! service children are created by the controller and owned by an invocation.

pub mod function;
pub mod invocation;
pub mod pipeline;
pub mod service;
