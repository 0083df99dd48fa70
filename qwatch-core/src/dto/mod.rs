//! Data Transfer Objects for batch-queue responses
//!
//! These are the shapes the remote batch system emits. They are parsed into
//! domain types by [`crate::status`] and never leave this crate's parsing layer.

pub mod qstat;
