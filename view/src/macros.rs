//! Custom macros for reducing code repetition

/// Log an error and continue execution (non-fatal error handling)
///
/// # Example
/// ```ignore
/// log_and_continue!(player.prepare(&url), "prepare media source");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::error!("Failed to {}: {}", $context, e);
        }
    };
}
