//! Shared type definitions for noticer
//!
//! Types in this module cross crate boundaries: endpoint descriptions handed in
//! by callers, and the channel identifiers used for error codes and metrics.

pub mod core;

pub use self::core::{ChannelKind, Context, Endpoint};
