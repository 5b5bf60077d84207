//! Core types and trait definitions for the invgate session manager.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The session, storage and client crates all depend on it.

pub mod backend;
pub mod error;
pub mod permission;
pub mod store;
pub mod user;

pub use error::{BackendError, Error, Result};
