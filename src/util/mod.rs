//! Utility modules: retry, timeout, background tasks.

pub mod background;
pub mod retry;
pub mod timeout;
