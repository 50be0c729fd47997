//! Logging macros.
//!
//! Routes the crate's log lines to the `log` facade or to `esp-println`,
//! depending on which feature is enabled. With neither feature the arguments
//! are still type-checked but nothing is emitted.

#![macro_use]
#![allow(unused_macros)]

macro_rules! log_line {
    ($level:ident, $prefix:literal, $($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::$level!($($arg)+);
        #[cfg(feature = "esp32-log")]
        ::esp_println::println!("{} {}", $prefix, ::core::format_args!($($arg)+));
        #[cfg(not(any(feature = "log", feature = "esp32-log")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)+) => {
        log_line!(trace, "TRACE", $($arg)+)
    };
}

macro_rules! debug {
    ($($arg:tt)+) => {
        log_line!(debug, "DEBUG", $($arg)+)
    };
}

macro_rules! info {
    ($($arg:tt)+) => {
        log_line!(info, "INFO ", $($arg)+)
    };
}

macro_rules! warn {
    ($($arg:tt)+) => {
        log_line!(warn, "WARN ", $($arg)+)
    };
}

macro_rules! error {
    ($($arg:tt)+) => {
        log_line!(error, "ERROR", $($arg)+)
    };
}
