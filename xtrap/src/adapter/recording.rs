use std::{cell::RefCell, collections::HashMap};

use log::{trace, warn};

use super::{ErrorCode, TrapAdapter};
use crate::diagnostics::codes::{ErrorConstant, X11_CORE_ERRORS};

/// In-process stand-in for a display connection.
///
/// Nothing goes over the wire: requests are only recorded, and errors are
/// injected by the caller. An error injected with [`fail`](Self::fail) is
/// caught at once by the innermost open trap, the way a reply to an already
/// synchronized request would be. One injected with
/// [`fail_in_transit`](Self::fail_in_transit) stays on the wire until the
/// next [`flush`](TrapAdapter::flush), and is then caught by whichever trap
/// is innermost at that moment.
pub struct RecordingDisplay {
    state: RefCell<State>,
    constants: Option<&'static [ErrorConstant]>,
}

#[derive(Default)]
struct State {
    traps: Vec<Vec<ErrorCode>>,
    in_transit: Vec<ErrorCode>,
    unhandled: Vec<ErrorCode>,
    requests: Vec<String>,
    error_text: HashMap<ErrorCode, String>,
    pushes: usize,
    pops: usize,
    flushes: usize,
}

impl State {
    fn deliver(&mut self, code: ErrorCode) {
        match self.traps.last_mut() {
            Some(caught) => caught.push(code),
            None => {
                warn!("X error {code} received outside of any trap");
                self.unhandled.push(code);
            }
        }
    }
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            constants: Some(X11_CORE_ERRORS),
        }
    }

    pub fn with_constants(mut self, constants: &'static [ErrorConstant]) -> Self {
        self.constants = Some(constants);
        self
    }

    /// Behave like a binding that exposes no error constants.
    pub fn without_constants(mut self) -> Self {
        self.constants = None;
        self
    }

    pub fn with_error_text(self, code: ErrorCode, text: &str) -> Self {
        self.state.borrow_mut().error_text.insert(code, text.to_owned());
        self
    }

    pub fn request(&self, description: impl Into<String>) {
        let description = description.into();
        trace!("request: {description}");
        self.state.borrow_mut().requests.push(description);
    }

    pub fn fail(&self, code: ErrorCode) {
        self.state.borrow_mut().deliver(code);
    }

    pub fn fail_in_transit(&self, code: ErrorCode) {
        self.state.borrow_mut().in_transit.push(code);
    }

    pub fn pushes(&self) -> usize {
        self.state.borrow().pushes
    }

    pub fn pops(&self) -> usize {
        self.state.borrow().pops
    }

    pub fn flushes(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn open_traps(&self) -> usize {
        self.state.borrow().traps.len()
    }

    pub fn in_transit(&self) -> usize {
        self.state.borrow().in_transit.len()
    }

    pub fn unhandled_errors(&self) -> Vec<ErrorCode> {
        self.state.borrow().unhandled.clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }
}

impl TrapAdapter for RecordingDisplay {
    fn push_trap(&self) {
        let mut state = self.state.borrow_mut();
        state.pushes += 1;
        state.traps.push(Vec::new());
    }

    fn pop_trap(&self) -> ErrorCode {
        let mut state = self.state.borrow_mut();
        state.pops += 1;
        match state.traps.pop() {
            Some(caught) => caught.first().copied().unwrap_or(0),
            None => {
                warn!("pop_trap() without a matching push_trap()");
                0
            }
        }
    }

    fn flush(&self) {
        let mut state = self.state.borrow_mut();
        state.flushes += 1;
        let in_transit = std::mem::take(&mut state.in_transit);
        for code in in_transit {
            state.deliver(code);
        }
    }

    fn error_code_to_name(&self, code: ErrorCode) -> Option<String> {
        self.state.borrow().error_text.get(&code).cloned()
    }

    fn error_constants(&self) -> Option<&'static [ErrorConstant]> {
        self.constants
    }
}
