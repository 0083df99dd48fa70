//! Core domain types
//!
//! This module contains the domain structures shared between the poller
//! (which produces them) and its hosts (the runner daemon and the CLI, which
//! report them).

pub mod job;
pub mod poll;
