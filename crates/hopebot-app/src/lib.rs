//! Process-level plumbing shared by HopeBot binaries.

pub mod logging;
