use std::{
    ffi::{c_char, c_int, c_uchar, c_ulong, c_void, CStr, CString},
    ptr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, error, warn};

use super::{ErrorCode, TrapAdapter};
use crate::error::{error_context, fallback_error, Error, Result};

type Display = c_void;

// Xlib.h
#[repr(C)]
#[allow(dead_code)]
struct XErrorEvent {
    kind: c_int,
    display: *mut Display,
    resourceid: c_ulong,
    serial: c_ulong,
    error_code: c_uchar,
    request_code: c_uchar,
    minor_code: c_uchar,
}

type XErrorHandler = Option<unsafe extern "C" fn(*mut Display, *mut XErrorEvent) -> c_int>;

struct XlibFns {
    open_display: unsafe extern "C" fn(*const c_char) -> *mut Display,
    close_display: unsafe extern "C" fn(*mut Display) -> c_int,
    sync: unsafe extern "C" fn(*mut Display, c_int) -> c_int,
    set_error_handler: unsafe extern "C" fn(XErrorHandler) -> XErrorHandler,
    get_error_text: unsafe extern "C" fn(*mut Display, c_int, *mut c_char, c_int) -> c_int,
}

const LIBRARY_NAME: &CStr = c"libX11.so.6";

macro_rules! load_symbol {
    ($library : expr, $name : literal) => {{
        let symbol = libc::dlsym($library, concat!($name, "\0").as_ptr() as *const c_char);
        if symbol.is_null() {
            Err(fallback_error!("missing symbol {}: {}", $name, dl_error()))
        } else {
            Ok(std::mem::transmute::<*mut c_void, _>(symbol))
        }
    }};
}

struct TrapSlot {
    display: usize,
    error_code: ErrorCode,
}

// Xlib has a single error handler for the whole process, so the open traps of
// every display and thread live here. The handler is installed when the first
// trap opens and the one it replaced is put back when the last trap closes.
struct TrapSlots {
    slots: Vec<TrapSlot>,
    previous: XErrorHandler,
}

impl TrapSlots {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            previous: None,
        }
    }

    /// Returns whether this is the first open trap.
    fn push(&mut self, display: usize) -> bool {
        self.slots.push(TrapSlot { display, error_code: 0 });
        self.slots.len() == 1
    }

    /// Closes the innermost trap of `display`: its error code, and whether no
    /// trap is left open. `None` when `display` has no open trap.
    fn pop(&mut self, display: usize) -> Option<(ErrorCode, bool)> {
        let position = self.slots.iter().rposition(|slot| slot.display == display)?;
        let code = self.slots.remove(position).error_code;
        Some((code, self.slots.is_empty()))
    }

    /// Hands `code` to the innermost trap of `display`, which keeps only the
    /// oldest. Returns false when `display` has no open trap.
    fn record(&mut self, display: usize, code: ErrorCode) -> bool {
        match self.slots.iter_mut().rev().find(|slot| slot.display == display) {
            Some(slot) => {
                if slot.error_code == 0 {
                    slot.error_code = code;
                }
                true
            }
            None => false,
        }
    }

    fn is_open(&self, display: usize) -> bool {
        self.slots.iter().any(|slot| slot.display == display)
    }
}

static TRAPS: Mutex<TrapSlots> = Mutex::new(TrapSlots::new());

fn lock(traps: &Mutex<TrapSlots>) -> MutexGuard<'_, TrapSlots> {
    traps.lock().unwrap_or_else(PoisonError::into_inner)
}

unsafe extern "C" fn record_error(display: *mut Display, event: *mut XErrorEvent) -> c_int {
    dispatch_error(&TRAPS, display, event)
}

unsafe fn dispatch_error(traps: &Mutex<TrapSlots>, display: *mut Display, event: *mut XErrorEvent) -> c_int {
    if event.is_null() {
        return 0;
    }

    let code = (*event).error_code as ErrorCode;
    let forward = {
        let mut traps = lock(traps);
        if traps.record(display as usize, code) {
            return 0;
        }
        traps.previous
    };

    match forward {
        Some(previous) => previous(display, event),
        None => {
            let event = &*event;
            error!(
                "X error {code} (request {}.{}, resource 0x{:x}, serial {}) outside of any trap",
                event.request_code, event.minor_code, event.resourceid, event.serial
            );
            0
        }
    }
}

/// Trap adapter over a live Xlib connection.
///
/// `libX11` is loaded when the display is opened, so nothing links against
/// it at build time.
pub struct XlibDisplay {
    fns: XlibFns,
    library: *mut c_void,
    display: *mut Display,
}

impl XlibDisplay {
    /// Opens `name`, or `$DISPLAY` when `None`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let name = name.map(CString::new).transpose()?;

        let library = unsafe { libc::dlopen(LIBRARY_NAME.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if library.is_null() {
            return Err(Error::LibraryUnavailable(dl_error()));
        }

        let fns = match unsafe { Self::load(library) } {
            Ok(fns) => fns,
            Err(err) => {
                unsafe { libc::dlclose(library) };
                return error_context!(Err(err), "{} is not a usable Xlib", LIBRARY_NAME.to_string_lossy());
            }
        };

        let display = unsafe { (fns.open_display)(name.as_ref().map_or(ptr::null(), |n| n.as_ptr())) };
        if display.is_null() {
            let target = name
                .as_ref()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| std::env::var("DISPLAY").unwrap_or_default());
            let errno = errno::errno();
            unsafe { libc::dlclose(library) };
            return Err(Error::NoDisplay(format!("'{target}' ({errno})")));
        }

        debug!("Opened X display {display:?}");
        Ok(Self { fns, library, display })
    }

    unsafe fn load(library: *mut c_void) -> Result<XlibFns> {
        Ok(XlibFns {
            open_display: load_symbol!(library, "XOpenDisplay")?,
            close_display: load_symbol!(library, "XCloseDisplay")?,
            sync: load_symbol!(library, "XSync")?,
            set_error_handler: load_symbol!(library, "XSetErrorHandler")?,
            get_error_text: load_symbol!(library, "XGetErrorText")?,
        })
    }

    pub fn from_env() -> Result<Self> {
        error_context!(Self::open(None), "Failed to open the default display")
    }

    fn key(&self) -> usize {
        self.display as usize
    }
}

impl TrapAdapter for XlibDisplay {
    fn push_trap(&self) {
        let mut traps = lock(&TRAPS);
        if traps.push(self.key()) {
            traps.previous = unsafe { (self.fns.set_error_handler)(Some(record_error)) };
        }
    }

    fn pop_trap(&self) -> ErrorCode {
        let mut traps = lock(&TRAPS);
        match traps.pop(self.key()) {
            Some((code, last)) => {
                if last {
                    let previous = traps.previous.take();
                    unsafe { (self.fns.set_error_handler)(previous) };
                }
                code
            }
            None => {
                warn!("pop_trap() without a matching push_trap() on display {:?}", self.display);
                0
            }
        }
    }

    fn flush(&self) {
        unsafe { (self.fns.sync)(self.display, 0) };
    }

    fn error_code_to_name(&self, code: ErrorCode) -> Option<String> {
        let mut buffer = [0 as c_char; 256];
        unsafe {
            (self.fns.get_error_text)(self.display, code, buffer.as_mut_ptr(), buffer.len() as c_int);
            let text = CStr::from_ptr(buffer.as_ptr()).to_string_lossy();
            (!text.is_empty()).then(|| text.into_owned())
        }
    }
}

impl Drop for XlibDisplay {
    fn drop(&mut self) {
        if lock(&TRAPS).is_open(self.key()) {
            error!("Closing X display {:?} with traps still open", self.display);
        }

        unsafe {
            (self.fns.close_display)(self.display);
            libc::dlclose(self.library);
        }
    }
}

fn dl_error() -> String {
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return "unknown dynamic loader error".to_owned();
    }
    unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
}
