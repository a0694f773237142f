//! Typed HTTP client for the atom task runtime.
//!
//! The runtime exposes two endpoints the gateway consumes:
//!
//! - `POST /v1/tasks` -- submit a task
//! - `GET /v1/tasks/{id}` -- fetch a task snapshot
//!
//! Responses use the envelope `{ok: true, data: T}` or
//! `{ok: false, error: {code, message}}`. The envelope is authoritative;
//! the HTTP status is only consulted to pick the failure mapping. The
//! client performs no retries and no caching -- polling cadence is the
//! caller's concern.

mod client;
mod error;
mod types;

pub use client::RuntimeClient;
pub use error::ClientError;
pub use types::{CreateTaskRequest, CreateTaskResponse, GetTaskResponse};
