//! Exit codes for the CLI

#![allow(dead_code)]

/// Success, including the "nothing changed" path
pub const SUCCESS: i32 = 0;

/// Any error: configuration, workspace, checkpoint or script failure
pub const ERROR: i32 = 1;
