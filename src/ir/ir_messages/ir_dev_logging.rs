// GRAPH LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_graph")]
macro_rules! graph_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_graph"))]
macro_rules! graph_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// PASS LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_passes")]
macro_rules! pass_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_passes"))]
macro_rules! pass_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// ANALYSIS CACHE LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_analysis")]
macro_rules! analysis_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_analysis"))]
macro_rules! analysis_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green #$time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        let _ = &$time;
    };
}
