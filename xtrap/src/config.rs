use std::{env, sync::OnceLock};

use log::warn;

pub const SYNCHRONIZE_VAR: &str = "XTRAP_SYNCHRONIZE";
pub const VERIFY_MAIN_THREAD_VAR: &str = "XTRAP_VERIFY_MAIN_THREAD";
pub const LOG_SYNC_VAR: &str = "XTRAP_LOG_SYNC";
pub const LOG_NESTED_VAR: &str = "XTRAP_LOG_NESTED";

/// Switches controlling how traps synchronize and what they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapConfig {
    /// `call` and `swallow` always pay for a round trip (debugging aid).
    pub synchronize: bool,
    /// Complain when a trap is entered from a thread that does not own the
    /// connection.
    pub verify_thread: bool,
    /// Log every enter/exit with its nesting level.
    pub log_sync: bool,
    /// Log a backtrace whenever a trap is entered while another is open.
    pub log_nested: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            synchronize: false,
            verify_thread: true,
            log_sync: false,
            log_nested: false,
        }
    }
}

impl TrapConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            synchronize: env_flag(SYNCHRONIZE_VAR, defaults.synchronize),
            verify_thread: env_flag(VERIFY_MAIN_THREAD_VAR, defaults.verify_thread),
            log_sync: env_flag(LOG_SYNC_VAR, defaults.log_sync),
            log_nested: env_flag(LOG_NESTED_VAR, defaults.log_nested),
        }
    }

    /// The environment as it was the first time this was called; fixed for
    /// the rest of the process.
    pub fn process() -> Self {
        static CONFIG: OnceLock<TrapConfig> = OnceLock::new();
        *CONFIG.get_or_init(Self::from_env)
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            warn!("Invalid value {value:?} for {name}, using {default}");
            default
        }),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
