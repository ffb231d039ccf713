//! Parcel Common Library
//!
//! Shared utilities for the parcel ingestion workspace.
//!
//! - **Logging**: `tracing` subscriber setup for console and rolling log files
//! - **Text**: single-byte (latin-1) decoding of raw extract lines
//!
//! # Example
//!
//! ```no_run
//! use parcel_common::logging::{init_logging, LogConfig};
//! use parcel_common::text::decode_latin1;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let line = decode_latin1(b"1|caf\xe9|b\n");
//!     tracing::info!(%line, "decoded");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;
pub mod text;
