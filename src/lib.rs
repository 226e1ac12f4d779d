//! Filament - suspendable per-connection handlers over a polled event loop
//!
//! Bridges two execution models: a single-threaded network event loop that
//! delivers events synchronously, and per-connection handler logic that runs
//! as an independently resumable unit. Each connection owns one handler; on
//! every event the dispatcher resumes it and interprets whether it suspended
//! again, finished with a response value, or faulted.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod event;
pub mod files;
pub mod handler;
pub mod http;
pub mod manager;
