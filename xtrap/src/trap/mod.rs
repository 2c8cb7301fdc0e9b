// Batches of X requests are bracketed by traps so that a failure (say, the
// window went away while we were setting it up) can be reported for the batch
// as a whole, without paying for a round trip after every request.
//
// Traps nest. Only the exit that brings the depth back to 0 may synchronize
// with the server; everything nested below it is flushed by that one sync.
// The `Unsynced` variants are for callers that know the connection is already
// synchronized (the last request had a reply), so even that sync can go.

pub mod region;

use std::{
    any::type_name,
    cell::Cell,
    thread::{self, ThreadId},
};

use log::{debug, error, Level};

use crate::{
    adapter::{ErrorCode, TrapAdapter},
    config::TrapConfig,
    diagnostics::{log_stack, log_unmanaged, ErrorNames},
    error::{TrapFailure, XError},
};

pub use region::{Disposition, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Synced,
    Unsynced,
}

impl SyncMode {
    pub fn need_sync(self) -> bool {
        self == SyncMode::Synced
    }
}

/// The trap nesting state of one display connection.
///
/// Only usable from the thread that created it.
pub struct TrapStack<A: TrapAdapter> {
    adapter: A,
    depth: Cell<usize>,
    config: TrapConfig,
    owner: ThreadId,
    names: ErrorNames,
}

impl<A: TrapAdapter> TrapStack<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, TrapConfig::process())
    }

    pub fn with_config(adapter: A, config: TrapConfig) -> Self {
        Self {
            adapter,
            depth: Cell::new(0),
            config,
            owner: thread::current().id(),
            names: ErrorNames::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> TrapConfig {
        self.config
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn error_name(&self, code: ErrorCode) -> String {
        self.names.resolve(code, &self.adapter)
    }

    pub fn enter(&self) {
        self.verify_thread();
        self.adapter.push_trap();

        let depth = self.depth.get();
        if self.config.log_sync {
            debug!("X11 trap enter at level {depth}");
        }
        if self.config.log_nested && depth > 0 {
            debug!("Nested X11 trap at level {depth}:");
            log_stack(Level::Debug);
        }
        self.depth.set(depth + 1);
    }

    /// Closes the innermost trap and reports the first error it caught.
    ///
    /// Only the outermost exit flushes, and only when `need_sync` is set.
    pub fn exit(&self, need_sync: bool) -> Result<(), XError> {
        let Some(depth) = self.depth.get().checked_sub(1) else {
            error!("Error: X11 trap exit without a matching enter");
            log_stack(Level::Error);
            return Ok(());
        };
        self.depth.set(depth);

        if self.config.log_sync {
            debug!("X11 trap exit at level {depth}, need_sync={need_sync}");
        }
        if depth == 0 && need_sync {
            self.adapter.flush();
        }

        match self.adapter.pop_trap() {
            0 => Ok(()),
            code => Err(XError::new(code, self.error_name(code))),
        }
    }

    /// Runs `f` inside a trap.
    ///
    /// The trap is closed exactly once whatever `f` does. When `f` fails or
    /// panics, its failure is what the caller sees and an X error caught on
    /// the way out is only logged.
    pub fn call_with<T, E, F>(&self, mode: SyncMode, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        let region = Region::enter(self, Disposition::Strict, mode.need_sync());
        let value = f().inspect_err(|err| {
            debug!("{}({mode:?}) failed inside X11 trap: {err}", type_name::<F>());
        })?;
        region.close()?;
        Ok(value)
    }

    pub fn call_unsynced<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.call_with(SyncMode::Unsynced, f)
    }

    pub fn call_synced<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.call_with(SyncMode::Synced, f)
    }

    /// `call_synced` when the connection runs synchronized, `call_unsynced`
    /// otherwise.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.call_with(self.default_mode(), f)
    }

    /// Like [`call_with`](Self::call_with), but X errors only turn the result
    /// into `Ok(false)`.
    pub fn swallow_with<T, E, F>(&self, mode: SyncMode, f: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        match self.call_with(mode, f) {
            Ok(_) => Ok(true),
            Err(err) if err.as_x_error().is_some() => {
                debug!("Ignoring X error on {}: {err}", type_name::<F>());
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn swallow_unsynced<T, E, F>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.swallow_with(SyncMode::Unsynced, f)
    }

    pub fn swallow_synced<T, E, F>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.swallow_with(SyncMode::Synced, f)
    }

    pub fn swallow<T, E, F>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.swallow_with(self.default_mode(), f)
    }

    /// Opens a region; it is closed by [`Region::close`] or when dropped.
    pub fn region(&self, disposition: Disposition) -> Region<'_, A> {
        Region::enter(self, disposition, true)
    }

    /// Runs `f` in a region whose X errors are returned to the caller.
    pub fn strict<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        let region = self.region(Disposition::Strict);
        let value = f()?;
        region.close()?;
        Ok(value)
    }

    /// Runs `f` in a region whose X errors are discarded.
    ///
    /// `Ok(None)` when `f` itself gave up with an X error.
    pub fn swallow_region<T, E, F>(&self, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        self.region(Disposition::Swallow).run(f)
    }

    /// Like [`swallow_region`](Self::swallow_region), but with a description
    /// the discarded errors are reported as errors, along with it.
    pub fn log_region<T, E, F>(&self, description: Option<&str>, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TrapFailure,
    {
        let mut region = self.region(Disposition::Log);
        if let Some(description) = description {
            region = region.describe(description);
        }
        region.run(f)
    }

    /// Checks that no trap is open.
    pub fn assert_idle(&self) -> bool {
        let depth = self.depth.get();
        if depth != 0 {
            error!("Error: X11 trap still open at depth {depth}");
        }
        depth == 0
    }

    /// Checks that the caller runs inside a trap, logging where it came from
    /// when it does not.
    pub fn verify_managed(&self, context: Option<&str>) -> bool {
        let managed = self.depth.get() > 0;
        if !managed {
            log_unmanaged(context);
        }
        managed
    }

    fn default_mode(&self) -> SyncMode {
        if self.config.synchronize {
            SyncMode::Synced
        } else {
            SyncMode::Unsynced
        }
    }

    fn verify_thread(&self) {
        if !self.config.verify_thread {
            return;
        }

        let current = thread::current();
        if current.id() != self.owner {
            error!("Error: invalid access from thread {:?} ({:?})", current.name(), current.id());
            log_stack(Level::Error);
        }
    }
}

impl<A: TrapAdapter> Drop for TrapStack<A> {
    fn drop(&mut self) {
        self.assert_idle();
    }
}
