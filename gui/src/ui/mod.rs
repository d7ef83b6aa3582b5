//! User Interface handling functionality.
//!
//! This module contains all UI-related components organized by page:
//! - `app`: Application setup and gate controller start-up
//! - `navigation`: Splash timing, snapshot polling and page switching
//! - `auth_ui`: Fingerprint/PIN choice page
//! - `pin_ui`: PIN entry page
//! - `home_ui`: Protected home page

pub mod app;
pub mod auth_ui;
pub mod home_ui;
pub mod navigation;
pub mod pin_ui;

// Re-export commonly used items
pub use app::setup_application_ui;
