use std::env;

use log::{info, warn};
use xtrap::{
    diagnostics::codes::{BAD_MATCH, BAD_WINDOW, X11_CORE_ERRORS},
    error::Result,
    RecordingDisplay, TrapAdapter, TrapStack, XError,
};

struct Client {
    window: u32,
    title: &'static str,
    destroyed: bool,
    override_redirect: bool,
}

const CLIENTS: &[Client] = &[
    Client { window: 0x1200003, title: "terminal", destroyed: false, override_redirect: false },
    Client { window: 0x1400005, title: "dialog", destroyed: true, override_redirect: false },
    Client { window: 0x1600001, title: "tooltip", destroyed: false, override_redirect: true },
    Client { window: 0x1800007, title: "editor", destroyed: false, override_redirect: false },
];

type Stack<'a> = TrapStack<&'a RecordingDisplay>;

// Everything needed to adopt a window goes in one batch: if the client went
// away meanwhile, the whole batch is reported once.
fn manage(stack: &Stack, display: &RecordingDisplay, client: &Client) -> Result<()> {
    stack.strict(|| {
        for request in ["ChangeWindowAttributes", "ReparentWindow", "ChangeSaveSet", "MapWindow"] {
            display.request(format!("{request} {:#x}", client.window));
            if client.destroyed {
                display.fail_in_transit(BAD_WINDOW);
            }
        }
        Ok(())
    })
}

fn focus(stack: &Stack, display: &RecordingDisplay, client: &Client) -> Result<bool> {
    stack.swallow_unsynced(|| {
        display.request(format!("SetInputFocus {:#x}", client.window));
        if client.override_redirect {
            display.fail(BAD_MATCH);
        }
        Ok::<_, XError>(())
    })
    .map_err(Into::into)
}

fn sweep() -> Result<()> {
    let display = RecordingDisplay::new();
    let stack = TrapStack::new(&display);

    let mut managed = 0;
    for client in CLIENTS {
        match manage(&stack, &display, client) {
            Ok(()) => managed += 1,
            Err(err) => warn!("Unable to manage '{}' ({:#x}): {err}", client.title, client.window),
        }

        if !focus(&stack, &display, client)? {
            info!("'{}' refused the focus", client.title);
        }

        let description = format!("set _NET_WM_DESKTOP on {:#x}", client.window);
        stack.log_region(Some(description.as_str()), || {
            display.request(format!("ChangeProperty {:#x} _NET_WM_DESKTOP", client.window));
            Ok::<_, XError>(())
        })?;
    }

    info!(
        "Managed {managed}/{} clients with {} requests and {} round trips",
        CLIENTS.len(),
        display.requests().len(),
        display.flushes()
    );
    stack.assert_idle();
    Ok(())
}

fn probe(display_name: Option<&str>) -> Result<()> {
    let stack = match display_name {
        Some(name) => xtrap::connect_to(name)?,
        None => xtrap::connect()?,
    };

    stack.call_synced(|| Ok::<_, XError>(()))?;
    info!("Round trip completed");

    for &(code, name) in X11_CORE_ERRORS {
        let text = stack.adapter().error_code_to_name(code).unwrap_or_default();
        info!("{code:>3} {name:<18} {text}");
    }
    Ok(())
}

fn main() -> Result<()> {
    xtrap::init_log();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--x11") => probe(args.get(1).map(String::as_str)),
        _ => sweep(),
    }
}
