//! PIN entry page.

use gtk4::prelude::*;
use log::{info, warn};
use medremind_core::{GateSnapshot, PinBuffer, PinView};

use crate::context::AppContext;

/// Wire up the PIN entry, Submit and Back.
pub fn setup_pin_page(ctx: &AppContext) {
    let pin = &ctx.ui.pin;

    {
        let ctx = ctx.clone();
        pin.entry.connect_changed(move |entry| {
            let text = entry.text();
            let digits = PinBuffer::sanitize(&text);
            if digits.as_str() != text.as_str() {
                // Re-enters this handler with the filtered text.
                entry.set_text(digits.as_str());
                entry.set_position(-1);
                return;
            }
            if !digits.is_empty() && ctx.ui.pin.error_label.is_visible() {
                // Typing a new PIN clears the previous error.
                ctx.dismiss_error();
                ctx.ui.pin.error_label.set_visible(false);
            }
            update_submit(&ctx, digits.len());
        });
    }

    {
        let ctx = ctx.clone();
        pin.submit.connect_clicked(move |_| submit(&ctx));
    }

    {
        let ctx = ctx.clone();
        pin.entry.connect_activate(move |_| submit(&ctx));
    }

    {
        let ctx = ctx.clone();
        pin.back.connect_clicked(move |_| {
            info!("User left PIN entry, starting over");
            ctx.gate.reset();
        });
    }
}

/// Update the PIN page from a snapshot.
pub fn render(ctx: &AppContext, snapshot: &GateSnapshot) {
    let pin = &ctx.ui.pin;
    let view = PinView::from_snapshot(snapshot);

    pin.title.set_label(view.title);
    pin.submit.set_label(view.submit_label);
    pin.entry.set_sensitive(view.entry_sensitive);
    pin.back.set_sensitive(view.entry_sensitive);
    pin.submit
        .set_sensitive(view.can_submit(PinBuffer::sanitize(&pin.entry.text()).len()));

    match &view.error {
        Some(message) if !ctx.error_dismissed(snapshot) => {
            pin.error_label.set_label(message);
            pin.error_label.set_visible(true);
        }
        _ => pin.error_label.set_visible(false),
    }
}

/// Clear the entry and focus it.
pub fn reset_entry(ctx: &AppContext) {
    ctx.ui.pin.entry.set_text("");
    ctx.ui.pin.entry.grab_focus();
}

fn update_submit(ctx: &AppContext, digits: usize) {
    let view = PinView::from_snapshot(&ctx.latest.borrow());
    ctx.ui.pin.submit.set_sensitive(view.can_submit(digits));
}

fn submit(ctx: &AppContext) {
    let entry = &ctx.ui.pin.entry;
    let candidate = match PinBuffer::parse(&entry.text()) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!("Ignoring PIN submission: {}", e);
            return;
        }
    };
    if let Err(e) = candidate.ensure_complete() {
        info!("Ignoring PIN submission: {}", e);
        return;
    }

    info!("User submitted PIN");
    entry.set_text("");
    ctx.gate.submit_pin(candidate);
}
