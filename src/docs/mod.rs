//! Document-backed storage: auth, the Docs API client, the entry template,
//! and the append-only log built on top of them.

pub mod auth;
pub mod client;
pub mod log;
pub mod template;

pub use client::{DocumentApi, GoogleDocsClient};
pub use log::DocumentLog;
