//! Front-end constants and the loaded unlock configuration.

use std::time::Duration;

use medremind_core::AuthConfig;
use once_cell::sync::Lazy;

pub use medremind_core::config::app_info;

/// Unlock settings, read once from `$XDG_CONFIG_HOME/medremind/config.json`.
pub static CONFIG: Lazy<AuthConfig> = Lazy::new(AuthConfig::load);

/// How long the splash page stays up.
pub const SPLASH_DURATION: Duration = Duration::from_millis(1500);

/// How often the main loop checks for a new gate snapshot.
pub const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Compiled resource bundle locations.
pub mod resources {
    pub const MAIN_UI: &str = "/io/github/medremind/ui/main.ui";
    pub const STYLE: &str = "/io/github/medremind/css/style.css";
}

/// Stack page names.
pub mod pages {
    pub const SPLASH: &str = "splash";
}
