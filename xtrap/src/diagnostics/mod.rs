pub mod codes;

use std::{backtrace::Backtrace, cell::OnceCell, collections::HashMap};

use log::{debug, error, Level};

use crate::adapter::{ErrorCode, TrapAdapter};
use codes::is_error_constant;

/// Per-connection cache of `code -> symbolic name`.
///
/// Built the first time a name is needed, from the constants the binding
/// exposes. The mapping is fixed for the lifetime of a connection.
#[derive(Default)]
pub struct ErrorNames {
    names: OnceCell<HashMap<ErrorCode, &'static str>>,
}

impl ErrorNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<A: TrapAdapter + ?Sized>(&self, code: ErrorCode, adapter: &A) -> String {
        let names = self.names.get_or_init(|| {
            let names = build_names(adapter);
            debug!("Initialized X11 error names: {names:?}");
            names
        });

        if let Some(name) = names.get(&code) {
            return name.to_string();
        }

        match adapter.error_code_to_name(code) {
            Some(text) if !text.is_empty() => text,
            _ => code.to_string(),
        }
    }
}

fn build_names<A: TrapAdapter + ?Sized>(adapter: &A) -> HashMap<ErrorCode, &'static str> {
    let mut names = HashMap::new();
    names.insert(0, "OK");

    for &(code, name) in adapter.error_constants().unwrap_or_default() {
        if is_error_constant(name) {
            names.insert(code, name);
        }
    }
    names
}

/// One-shot resolution without a session cache.
pub fn resolve_error_name<A: TrapAdapter + ?Sized>(code: ErrorCode, adapter: &A) -> String {
    ErrorNames::new().resolve(code, adapter)
}

/// Logs the caller's stack, one record per line.
pub(crate) fn log_stack(level: Level) {
    let backtrace = Backtrace::force_capture().to_string();
    for line in backtrace.lines() {
        log::log!(level, " {line}");
    }
}

pub(crate) fn log_unmanaged(context: Option<&str>) {
    error!("Error: unmanaged X11 context");
    if let Some(context) = context {
        error!(" {context}");
    }
    log_stack(Level::Error);
}
