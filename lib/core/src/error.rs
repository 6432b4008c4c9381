//! Error handling foundation for relaydesk.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error types in their own
//! error modules; rootcause reports are used at the outer boundary
//! (server bootstrap, repositories) where errors are logged, not matched.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
