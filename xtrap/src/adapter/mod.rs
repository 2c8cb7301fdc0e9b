pub mod recording;
pub mod xlib;

use crate::diagnostics::codes::{ErrorConstant, X11_CORE_ERRORS};

pub use recording::RecordingDisplay;
pub use xlib::XlibDisplay;

pub type ErrorCode = i32;

// Implementation of this trait are recommended to use interior mutability
// (https://doc.rust-lang.org/reference/interior-mutability.html)
//
// Traps are strictly nested: every `pop_trap` closes the most recent
// `push_trap` and reports the oldest error caught while it was open, or 0.
pub trait TrapAdapter {
    fn push_trap(&self);
    fn pop_trap(&self) -> ErrorCode;

    /// Sends every buffered request and waits until the server answered all
    /// of them, errors included.
    fn flush(&self);

    /// Textual description of `code`, as the client library renders it.
    fn error_code_to_name(&self, code: ErrorCode) -> Option<String>;

    /// Symbolic error constants exposed by the binding, `None` when the
    /// binding cannot provide them.
    fn error_constants(&self) -> Option<&'static [ErrorConstant]> {
        Some(X11_CORE_ERRORS)
    }
}

impl<A: TrapAdapter + ?Sized> TrapAdapter for &A {
    fn push_trap(&self) {
        (**self).push_trap()
    }

    fn pop_trap(&self) -> ErrorCode {
        (**self).pop_trap()
    }

    fn flush(&self) {
        (**self).flush()
    }

    fn error_code_to_name(&self, code: ErrorCode) -> Option<String> {
        (**self).error_code_to_name(code)
    }

    fn error_constants(&self) -> Option<&'static [ErrorConstant]> {
        (**self).error_constants()
    }
}
