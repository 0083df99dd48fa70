//! qwatch Core
//!
//! Core types and abstractions for watching remote batch-queue jobs.
//!
//! This crate contains:
//! - Domain types: job handles, poll results and the poller state machine
//! - DTOs: wire shapes of batch-queue status reports
//! - Encoding: transport decoding of remote command output
//! - Status: parsing and interpretation of batch-queue status reports

pub mod domain;
pub mod dto;
pub mod encoding;
pub mod status;
