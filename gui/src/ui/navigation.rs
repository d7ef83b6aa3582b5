//! Splash timing, gate snapshot polling and page switching.

use gtk4::glib;
use gtk4::prelude::*;
use log::{debug, info, warn};
use medremind_core::{GateSnapshot, Navigation, Screen};

use crate::config::{pages, SNAPSHOT_POLL_INTERVAL, SPLASH_DURATION};
use crate::context::AppContext;
use crate::ui::{auth_ui, home_ui, pin_ui};

/// Show the splash, start following the gate, then switch to its page.
pub fn start(ctx: &AppContext) {
    ctx.ui.stack.set_visible_child_name(pages::SPLASH);
    apply_snapshot(ctx, ctx.gate.snapshot());
    watch_gate(ctx);

    let ctx_clone = ctx.clone();
    glib::timeout_add_local_once(SPLASH_DURATION, move || {
        let screen = Screen::for_state(&ctx_clone.snapshot().state);
        info!("Splash finished, showing {:?} page", screen);
        show_screen(&ctx_clone, screen);
    });
}

/// Poll the snapshot channel from the main loop.
fn watch_gate(ctx: &AppContext) {
    let mut snapshots = ctx.gate.subscribe();
    let ctx = ctx.clone();

    glib::timeout_add_local(SNAPSHOT_POLL_INTERVAL, move || {
        match snapshots.has_changed() {
            Ok(true) => {
                let snapshot = snapshots.borrow_and_update().clone();
                apply_snapshot(&ctx, snapshot);
                glib::ControlFlow::Continue
            }
            Ok(false) => glib::ControlFlow::Continue,
            Err(_) => {
                warn!("Gate controller stopped; the unlock screens will no longer update");
                glib::ControlFlow::Break
            }
        }
    });
}

/// Render a snapshot and navigate if it calls for another page.
fn apply_snapshot(ctx: &AppContext, snapshot: GateSnapshot) {
    if let Some(rejected) = &snapshot.rejected {
        debug!("Last command refused: {}", rejected);
    }
    let target = Screen::for_state(&snapshot.state);
    *ctx.latest.borrow_mut() = snapshot;

    let snapshot = ctx.snapshot();
    auth_ui::render(ctx, &snapshot);
    pin_ui::render(ctx, &snapshot);
    home_ui::render(ctx, &snapshot);

    // Page switches wait for the splash to finish.
    let Some(current) = ctx.screen.get() else {
        return;
    };
    if let Some(signal) = Navigation::between(current, target) {
        info!("Navigation: {:?}", signal);
        show_screen(ctx, target);
    }
}

fn show_screen(ctx: &AppContext, screen: Screen) {
    ctx.screen.set(Some(screen));
    if screen == Screen::Pin {
        pin_ui::reset_entry(ctx);
    }
    ctx.ui.stack.set_visible_child_name(screen.page_name());
}
