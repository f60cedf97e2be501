//! Utils module - logging setup and redaction helpers

pub mod logging;
pub mod sanitize;
