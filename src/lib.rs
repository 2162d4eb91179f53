pub mod crowd;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message every [`crowd::PERF_LOG_INTERVAL`] ticks when the `perf_stats`
/// feature is enabled.
///
/// With the feature disabled the macro expands to an empty block and its
/// arguments are never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(tick, "[SPATIAL] {} agents indexed", hash.total_entries());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        if $tick.0 % $crate::crowd::PERF_LOG_INTERVAL == 0 {
            bevy::prelude::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {};
}
