//! Start-up environment checks. They only log; the gate decides routing.

use log::{info, warn};
use medremind_core::{AuthConfig, FileCredentialStore};

/// Check fprintd service status.
pub fn check_fprintd_service() {
    match std::process::Command::new("systemctl")
        .args(["is-active", "fprintd"])
        .output()
    {
        Ok(output) => {
            let status_output = String::from_utf8_lossy(&output.stdout);
            let status = status_output.trim();
            if status == "active" {
                info!("fprintd service is running");
            } else {
                // fprintd is D-Bus activated, so "inactive" is normal until first use.
                info!("fprintd service status: {}", status);
            }
        }
        Err(e) => {
            warn!("Cannot check fprintd service status: {}", e);
        }
    }
}

/// Check whether a PIN credential has been set up.
pub fn check_credential_store(config: &AuthConfig) {
    let username = std::env::var("USER").unwrap_or_default();
    info!("Running as user: '{}'", username);

    match FileCredentialStore::from_config(config) {
        Ok(store) if store.is_configured() => {
            info!("PIN credential found at: {}", store.path().display());
        }
        Ok(store) => {
            warn!("No PIN credential at: {}", store.path().display());
            warn!("PIN unlock will fail until one is set with `medremind-pin set`");
        }
        Err(e) => warn!("Cannot locate the PIN credential store: {}", e),
    }
}

/// Log where the configuration was read from.
pub fn check_config_file() {
    match AuthConfig::config_file_path() {
        Some(path) if path.exists() => info!("Using configuration at: {}", path.display()),
        Some(path) => info!("No configuration at {}, using defaults", path.display()),
        None => warn!("No configuration directory available, using defaults"),
    }
}
