//! Remote data store module.
//!
//! This module provides the `RemoteStore` boundary trait and `ApiClient`,
//! its HTTP implementation for the spreadsheet-backed web app. The store
//! exposes one endpoint: `GET` for the full snapshot, `POST` for an
//! `{action, payload}` mutation command.

pub mod client;
pub mod error;
pub mod protocol;

pub use client::ApiClient;
pub use error::ApiError;
pub use protocol::{RemoteAction, RemoteCommand, RemoteReply, RemoteStore, ReplyStatus};
