//! Authentication page: fingerprint prompt, PIN route and inline errors.

use gtk4::prelude::*;
use log::info;
use medremind_core::{AuthView, GateSnapshot, GateState};

use crate::context::AppContext;

/// Wire up the authentication page buttons.
pub fn setup_auth_page(ctx: &AppContext) {
    let auth = &ctx.ui.auth;

    {
        let ctx = ctx.clone();
        auth.button.connect_clicked(move |_| {
            if matches!(ctx.snapshot().state, GateState::Failed { .. }) {
                info!("User clicked retry after a failed attempt");
                ctx.gate.retry();
            } else {
                info!("User clicked 'Authenticate'");
                ctx.gate.begin();
            }
        });
    }

    {
        let ctx = ctx.clone();
        auth.cancel.connect_clicked(move |_| {
            info!("User cancelled the fingerprint prompt");
            ctx.gate.cancel();
        });
    }

    {
        let ctx = ctx.clone();
        auth.use_pin.connect_clicked(move |_| {
            info!("User clicked 'Use PIN'");
            ctx.gate.use_pin();
        });
    }

    {
        let ctx = ctx.clone();
        auth.error_dismiss.connect_clicked(move |_| {
            ctx.dismiss_error();
            ctx.ui.auth.error_box.set_visible(false);
        });
    }
}

/// Update the authentication page from a snapshot.
pub fn render(ctx: &AppContext, snapshot: &GateSnapshot) {
    let auth = &ctx.ui.auth;
    let view = AuthView::from_snapshot(snapshot);

    auth.instruction.set_label(view.instruction);
    auth.button_label.set_label(view.button_label);
    auth.button_icon.set_icon_name(Some(view.button_icon));
    auth.button.set_sensitive(view.button_sensitive);

    match (&view.prompt, &view.cancel_label) {
        (Some(prompt), Some(cancel)) => {
            auth.prompt_label.set_label(prompt);
            auth.cancel.set_label(cancel);
            auth.prompt_box.set_visible(true);
        }
        _ => auth.prompt_box.set_visible(false),
    }
    auth.use_pin.set_visible(view.show_use_pin);

    match &view.error {
        Some(message) if !ctx.error_dismissed(snapshot) => {
            auth.error_label.set_label(message);
            auth.error_box.set_visible(true);
        }
        _ => auth.error_box.set_visible(false),
    }
}
