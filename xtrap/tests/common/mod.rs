#![allow(dead_code)]

use std::{cell::RefCell, sync::Once};

use log::{Level, LevelFilter, Log, Metadata, Record};
use xtrap::{RecordingDisplay, TrapConfig, TrapStack};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

// Tests run on parallel threads, so each thread only sees its own records.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let _ = RECORDS.try_with(|records| {
            records.borrow_mut().push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Installs the capturing logger and forgets what this thread logged so far.
pub fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("Unable to install the capturing logger");
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

pub fn records() -> Vec<(Level, String)> {
    RECORDS.with(|records| records.borrow().clone())
}

pub fn logged(level: Level) -> Vec<String> {
    records()
        .into_iter()
        .filter(|(l, _)| *l == level)
        .map(|(_, message)| message)
        .collect()
}

pub fn stack(display: &RecordingDisplay) -> TrapStack<&RecordingDisplay> {
    stack_with(display, TrapConfig::default())
}

pub fn stack_with(display: &RecordingDisplay, config: TrapConfig) -> TrapStack<&RecordingDisplay> {
    capture_logs();
    TrapStack::with_config(display, config)
}
