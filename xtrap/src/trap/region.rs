use std::thread;

use log::{debug, error, Level};

use super::TrapStack;
use crate::{
    adapter::TrapAdapter,
    diagnostics::log_stack,
    error::{TrapFailure, XError},
};

/// What a region does with the X error it catches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand it to the caller, unless the guarded code already failed.
    Strict,
    /// Drop it, leaving a debug record.
    Swallow,
    /// Drop it, reporting it as an error when the region was described.
    Log,
}

/// An open trap.
///
/// Closed exactly once: by [`close`](Self::close), or by `Drop` when the code
/// it guards returns early or panics. In the latter case the guarded code's
/// own failure takes precedence and a caught X error is only logged.
#[must_use = "dropping a region closes it immediately"]
pub struct Region<'s, A: TrapAdapter> {
    stack: &'s TrapStack<A>,
    disposition: Disposition,
    need_sync: bool,
    description: Option<String>,
    open: bool,
}

#[derive(Clone, Copy)]
enum Leaving {
    Closed,
    Early,
    Unwinding,
}

impl<'s, A: TrapAdapter> Region<'s, A> {
    pub(crate) fn enter(stack: &'s TrapStack<A>, disposition: Disposition, need_sync: bool) -> Self {
        stack.enter();
        Self {
            stack,
            disposition,
            need_sync,
            description: None,
            open: true,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Leaves the region. Only a strict region can fail here.
    pub fn close(mut self) -> Result<(), XError> {
        match self.release() {
            Err(err) if self.disposition == Disposition::Strict => Err(err),
            Err(err) => {
                self.discard(&err, Leaving::Closed);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Runs `f` and closes the region.
    ///
    /// Non strict regions turn an X error returned by `f` into `Ok(None)`;
    /// any other error is returned once the trap is released.
    pub fn run<T, E, F>(self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        match f() {
            Ok(value) => {
                self.close()?;
                Ok(Some(value))
            }
            Err(err) => {
                self.report(&err);
                let swallowed = self.disposition != Disposition::Strict && err.as_x_error().is_some();
                drop(self);
                if swallowed {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn release(&mut self) -> Result<(), XError> {
        self.open = false;
        self.stack.exit(self.need_sync)
    }

    fn report(&self, err: &impl TrapFailure) {
        match (self.disposition, &self.description) {
            (Disposition::Log, Some(description)) => {
                error!("Error: {err}");
                error!(" X11 log context: {description}");
                log_stack(Level::Error);
            }
            (Disposition::Swallow | Disposition::Log, None) if err.as_x_error().is_some() => {
                debug!("XError swallowed: {err}");
            }
            _ => {}
        }
    }

    fn discard(&self, err: &XError, leaving: Leaving) {
        if let (Disposition::Log, Some(description)) = (self.disposition, &self.description) {
            error!("Error: {err} while leaving X11 log context: {description}");
            log_stack(Level::Error);
            return;
        }

        match leaving {
            Leaving::Closed => debug!("XError swallowed: {err}"),
            Leaving::Early => debug!("'{err}' detected while leaving X11 region early; discarding"),
            Leaving::Unwinding => debug!("'{err}' detected while already in unwind; discarding"),
        }
    }
}

impl<A: TrapAdapter> Drop for Region<'_, A> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }

        if let Err(err) = self.release() {
            let leaving = if thread::panicking() {
                Leaving::Unwinding
            } else {
                Leaving::Early
            };
            self.discard(&err, leaving);
        }
    }
}
