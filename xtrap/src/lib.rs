use std::env;

pub mod adapter;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod trap;

pub use adapter::{ErrorCode, RecordingDisplay, TrapAdapter, XlibDisplay};
pub use config::TrapConfig;
pub use diagnostics::resolve_error_name;
pub use error::{Error, Result, TrapFailure, XError};
pub use trap::{Disposition, Region, SyncMode, TrapStack};

pub fn init_log() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
}

/// Opens `$DISPLAY` and wraps it in a fresh trap stack.
pub fn connect() -> Result<TrapStack<XlibDisplay>> {
    Ok(TrapStack::new(XlibDisplay::from_env()?))
}

pub fn connect_to(display_name: &str) -> Result<TrapStack<XlibDisplay>> {
    Ok(TrapStack::new(XlibDisplay::open(Some(display_name))?))
}
