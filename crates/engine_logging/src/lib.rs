#![deny(missing_docs)]
//! Shared logging utilities for the harvest workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a process-wide stage label that every macro prefixes to its message, and a
//! minimal test initializer for the global logger.

use std::sync::RwLock;

/// Label used before any stage has been entered.
pub const NO_STAGE: &str = "-";

static STAGE: RwLock<&'static str> = RwLock::new(NO_STAGE);

/// Sets the pipeline stage label for the whole process.
///
/// Fetch tasks may hop between runtime worker threads, so the label is global
/// rather than thread-local. Stages run one after another, never interleaved.
pub fn set_stage(stage: &'static str) {
    if let Ok(mut guard) = STAGE.write() {
        *guard = stage;
    }
}

/// Returns the current pipeline stage label, or [`NO_STAGE`].
pub fn current_stage() -> &'static str {
    STAGE.read().map(|guard| *guard).unwrap_or(NO_STAGE)
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("[{}] {}", $crate::current_stage(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
