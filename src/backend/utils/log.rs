// src/backend/utils/log.rs
use std::fmt::Arguments;

/// Writes one leveled line to the replica debug log (stderr off-chain).
pub fn emit(level: &str, args: Arguments<'_>) {
    #[cfg(target_arch = "wasm32")]
    ic_cdk::println!("[{}] {}", level, args);
    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("[{}] {}", level, args);
}

macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("INFO", format_args!($($arg)*))
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("WARN", format_args!($($arg)*))
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::utils::log::emit("ERROR", format_args!($($arg)*))
    };
}
