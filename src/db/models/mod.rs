//! Database models split into domain-specific modules.

pub mod appointment;
pub mod common;
pub mod job_order;
pub mod user;

pub use appointment::*;
pub use common::*;
pub use job_order::*;
pub use user::*;
