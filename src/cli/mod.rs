//! CLI module - command-line interface
//!
//! Contains the console session.

pub mod console;

pub use console::Console;
