pub mod cli;
pub mod depot;
pub mod net;
pub mod protocol;
pub mod utils;

pub use depot::{Depot, DepotSnapshot};

#[macro_export]
macro_rules! log_debug {
    ($name:expr, $($arg:tt)*) => {
        $crate::utils::log::debug($name, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($name:expr, $($arg:tt)*) => {
        $crate::utils::log::info($name, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($name:expr, $($arg:tt)*) => {
        $crate::utils::log::warn($name, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($name:expr, $($arg:tt)*) => {
        $crate::utils::log::error($name, &format!($($arg)*))
    };
}
