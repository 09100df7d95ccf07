//! `phase-tracker` - causal attribution of world mutations
//!
//! A stack of phases records which engine operation is responsible for
//! every block change and entity spawn, captures those side effects while
//! the operation runs, and replays them through outward events when it
//! completes. Misuse of the stack is reported, never fatal.

pub mod capability;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod observability;
pub mod phase;
pub mod scenario;
pub mod sim;
