//! Job Bridge — hands OS-scheduled deferred jobs to an in-process engine.

pub mod bridge;
pub mod config;
pub mod demo;
pub mod error;
