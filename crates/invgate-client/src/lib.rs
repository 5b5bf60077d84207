//! HTTP implementation of [`invgate_core::backend::AuthBackend`] on top of
//! `reqwest`.

mod client;

pub use client::{ApiConfig, DEFAULT_API_URL, HttpBackend};
