//! Data models for EMS entities.
//!
//! This module contains all the data structures held in the sync cache:
//!
//! - Master data: `User`, `Department`, `Office`, `Bank`, `BankBranch`,
//!   `Post`, `Payscale`
//! - `Employee`: the leaf record referencing every master collection
//! - `AppData`: the aggregate snapshot, including the user → post mapping
//! - `Entity` / `EntityKind`: per-collection configuration used by the
//!   generic upsert and delete flows
//!
//! Field names on the wire follow the spreadsheet column headers
//! (`Office_ID`, `IFSC_Code`, ...).

pub mod employee;
pub mod entity;
pub mod master;
pub mod snapshot;

pub use employee::Employee;
pub use entity::{Entity, EntityKind};
pub use master::{Bank, BankBranch, Department, Office, Payscale, Post, User, UserType};
pub use snapshot::{AppData, Timestamps};
