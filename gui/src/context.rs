//! Shared context for the unlock pages.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use gtk4::{Box as GtkBox, Button, Entry, Image, Label, ProgressBar, Stack};
use medremind_core::{AuthAttempt, GateHandle, GateSnapshot, Screen};
use tokio::runtime::Runtime;

/// Everything the page handlers need: the runtime, the gate and the widgets.
#[derive(Clone)]
pub struct AppContext {
    pub rt: Arc<Runtime>,
    pub gate: GateHandle,
    pub ui: UiComponents,
    /// Last snapshot rendered on the main loop.
    pub latest: Rc<RefCell<GateSnapshot>>,
    /// Page currently shown; `None` while the splash is up.
    pub screen: Rc<Cell<Option<Screen>>>,
    /// Attempt whose error the user closed.
    pub dismissed: Rc<RefCell<Option<AuthAttempt>>>,
}

/// Widgets grouped by page.
#[derive(Clone)]
pub struct UiComponents {
    pub stack: Stack,
    pub auth: AuthWidgets,
    pub pin: PinWidgets,
    pub home: HomeWidgets,
}

#[derive(Clone)]
pub struct AuthWidgets {
    pub instruction: Label,
    pub button: Button,
    pub button_icon: Image,
    pub button_label: Label,
    pub prompt_box: GtkBox,
    pub prompt_label: Label,
    pub cancel: Button,
    pub use_pin: Button,
    pub error_box: GtkBox,
    pub error_label: Label,
    pub error_dismiss: Button,
}

#[derive(Clone)]
pub struct PinWidgets {
    pub title: Label,
    pub entry: Entry,
    pub submit: Button,
    pub back: Button,
    pub error_label: Label,
}

#[derive(Clone)]
pub struct HomeWidgets {
    pub status: Label,
    pub progress_bar: ProgressBar,
    pub progress_label: Label,
    pub quick_actions: Vec<Button>,
    pub lock: Button,
}

impl AppContext {
    pub fn new(rt: Arc<Runtime>, gate: GateHandle, ui: UiComponents) -> Self {
        let latest = Rc::new(RefCell::new(gate.snapshot()));
        Self {
            rt,
            gate,
            ui,
            latest,
            screen: Rc::new(Cell::new(None)),
            dismissed: Rc::new(RefCell::new(None)),
        }
    }

    /// Copy of the snapshot last applied to the widgets.
    pub fn snapshot(&self) -> GateSnapshot {
        self.latest.borrow().clone()
    }

    /// Hide the current attempt's error until another attempt ends.
    pub fn dismiss_error(&self) {
        let last = self.latest.borrow().last_attempt.clone();
        if last.is_some() {
            *self.dismissed.borrow_mut() = last;
        }
    }

    pub fn error_dismissed(&self, snapshot: &GateSnapshot) -> bool {
        medremind_core::error_dismissed(snapshot, self.dismissed.borrow().as_ref())
    }

    pub fn splash_done(&self) -> bool {
        self.screen.get().is_some()
    }
}
