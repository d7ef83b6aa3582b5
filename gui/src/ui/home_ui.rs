//! Protected home page.

use gtk4::prelude::*;
use log::info;
use medremind_core::{AuthMethod, GateSnapshot, GateState};

use crate::context::AppContext;

/// Wire up the placeholder dashboard and the Lock button.
pub fn setup_home_page(ctx: &AppContext) {
    let home = &ctx.ui.home;

    home.progress_bar.set_fraction(0.0);
    home.progress_label.set_label("0 of 0 doses taken");

    for action in &home.quick_actions {
        action.connect_clicked(|button| {
            info!(
                "Quick action '{}' is not available yet",
                button.label().unwrap_or_default()
            );
        });
    }

    let ctx = ctx.clone();
    home.lock.connect_clicked(move |_| {
        info!("User locked the app");
        ctx.gate.reset();
    });
}

/// Update the home page from a snapshot.
pub fn render(ctx: &AppContext, snapshot: &GateSnapshot) {
    let status = match snapshot.state {
        GateState::Unlocked {
            method: AuthMethod::Biometric,
        } => "Unlocked with fingerprint",
        GateState::Unlocked {
            method: AuthMethod::Pin,
        } => "Unlocked with PIN",
        _ => "Locked",
    };
    ctx.ui.home.status.set_label(status);
}
