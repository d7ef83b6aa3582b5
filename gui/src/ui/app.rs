//! Application setup and initialization functionality.

use std::sync::Arc;

use gtk4::glib;
use gtk4::prelude::*;
use gtk4::{gio, Application, ApplicationWindow, Builder, CssProvider};
use log::{info, warn};
use medremind_core::{
    CredentialError, CredentialSource, FileCredentialStore, FprintdPlatform, GateController,
    GateHandle, PinCredential, PinVerifier,
};
use tokio::runtime::Runtime;

use crate::config::{app_info, resources, CONFIG};
use crate::context::{AppContext, AuthWidgets, HomeWidgets, PinWidgets, UiComponents};
use crate::system;
use crate::ui::{auth_ui, home_ui, navigation, pin_ui};

/// Initialize and set up main application UI.
pub fn setup_application_ui(app: &Application) {
    info!("Initializing application components");

    let rt = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build Tokio runtime"),
    );
    info!("Tokio async runtime initialized");

    setup_resources_and_theme();

    let builder = Builder::from_resource(resources::MAIN_UI);
    let window = create_main_window(app, &builder);

    window.present();

    info!("Performing system environment checks");
    system::check_config_file();
    system::check_fprintd_service();
    system::check_credential_store(&CONFIG);

    let (controller, gate) = create_gate_controller();
    let ctx = setup_ui_components(rt, gate, &builder);
    ctx.rt.spawn(controller.run());
    info!("Gate controller running");

    auth_ui::setup_auth_page(&ctx);
    pin_ui::setup_pin_page(&ctx);
    home_ui::setup_home_page(&ctx);
    navigation::start(&ctx);

    info!("{} startup complete", app_info::NAME);
}

/// Set up resources and theme.
fn setup_resources_and_theme() {
    gio::resources_register_include!("medremind.gresource")
        .expect("Failed to register gresources");

    if let Some(display) = gtk4::gdk::Display::default() {
        info!("Setting up UI theme and styling");
        let css_provider = CssProvider::new();
        css_provider.load_from_resource(resources::STYLE);
        gtk4::style_context_add_provider_for_display(
            &display,
            &css_provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    } else {
        warn!("No default display found - UI theming may not work properly");
    }
}

/// Create main application window.
fn create_main_window(app: &Application, builder: &Builder) -> ApplicationWindow {
    let window: ApplicationWindow = extract_widget(builder, "app_window");
    window.set_application(Some(app));
    window.set_title(Some(app_info::NAME));
    window
}

/// Used when no credential location can be resolved; every PIN check reports it.
struct UnresolvedStore;

impl CredentialSource for UnresolvedStore {
    fn load(&self) -> Result<Option<PinCredential>, CredentialError> {
        Err(CredentialError::NoConfigDir)
    }
}

/// Build the gate controller over fprintd and the on-disk PIN store.
fn create_gate_controller() -> (GateController<FprintdPlatform>, GateHandle) {
    let source: Arc<dyn CredentialSource> = match FileCredentialStore::from_config(&CONFIG) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("PIN credential store unavailable: {}", e);
            Arc::new(UnresolvedStore)
        }
    };

    GateController::new(FprintdPlatform::new(), PinVerifier::new(source), &CONFIG)
}

/// Helper to extract widgets from builder with consistent error handling.
pub fn extract_widget<T: IsA<glib::Object>>(builder: &Builder, name: &str) -> T {
    builder
        .object(name)
        .unwrap_or_else(|| panic!("Failed to get {}", name))
}

/// Set up UI components and return application context.
fn setup_ui_components(rt: Arc<Runtime>, gate: GateHandle, builder: &Builder) -> AppContext {
    let auth = AuthWidgets {
        instruction: extract_widget(builder, "auth_instruction"),
        button: extract_widget(builder, "auth_button"),
        button_icon: extract_widget(builder, "auth_button_icon"),
        button_label: extract_widget(builder, "auth_button_label"),
        prompt_box: extract_widget(builder, "prompt_box"),
        prompt_label: extract_widget(builder, "prompt_label"),
        cancel: extract_widget(builder, "prompt_cancel_button"),
        use_pin: extract_widget(builder, "prompt_use_pin_button"),
        error_box: extract_widget(builder, "auth_error_box"),
        error_label: extract_widget(builder, "auth_error_label"),
        error_dismiss: extract_widget(builder, "auth_error_dismiss"),
    };

    let pin = PinWidgets {
        title: extract_widget(builder, "pin_title"),
        entry: extract_widget(builder, "pin_entry"),
        submit: extract_widget(builder, "pin_submit"),
        back: extract_widget(builder, "pin_back"),
        error_label: extract_widget(builder, "pin_error_label"),
    };

    let home = HomeWidgets {
        status: extract_widget(builder, "home_status_label"),
        progress_bar: extract_widget(builder, "progress_bar"),
        progress_label: extract_widget(builder, "progress_label"),
        quick_actions: [
            "action_add_medication",
            "action_calendar",
            "action_history",
            "action_refill_tracker",
        ]
        .into_iter()
        .map(|id| extract_widget(builder, id))
        .collect(),
        lock: extract_widget(builder, "lock_button"),
    };

    info!("All UI components successfully initialized from builder");

    let ui = UiComponents {
        stack: extract_widget(builder, "stack"),
        auth,
        pin,
        home,
    };

    AppContext::new(rt, gate, ui)
}
