/// Increment an operation counter by 1.
///
/// Compiles to nothing when the `stats` feature is disabled.
#[macro_export]
macro_rules! stat_inc {
    ($stats:expr, $counter:ident) => {
        #[cfg(feature = "stats")]
        {
            $stats
                .$counter
                .fetch_add(1, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Add a value to an operation counter.
///
/// Compiles to nothing (including the value expression) when the `stats`
/// feature is disabled.
#[macro_export]
macro_rules! stat_add {
    ($stats:expr, $counter:ident, $val:expr) => {
        #[cfg(feature = "stats")]
        {
            $stats
                .$counter
                .fetch_add($val as u64, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}
