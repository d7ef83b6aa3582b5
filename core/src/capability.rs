//! Fail-closed capability probe.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::platform::BiometricPlatform;

/// Snapshot of what the host can do right now. Derived fresh on each probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCapability {
    pub has_hardware: bool,
    pub is_enrolled: bool,
}

impl AuthCapability {
    /// Both sensor and enrollment present.
    pub fn biometric_ready(&self) -> bool {
        self.has_hardware && self.is_enrolled
    }
}

/// Queries the platform for sensor presence and enrollment.
pub struct CapabilityProbe<P> {
    platform: Arc<P>,
}

impl<P> Clone for CapabilityProbe<P> {
    fn clone(&self) -> Self {
        Self {
            platform: Arc::clone(&self.platform),
        }
    }
}

impl<P: BiometricPlatform> CapabilityProbe<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self { platform }
    }

    /// Never fails: any platform error reports both flags as `false`.
    pub async fn probe(&self) -> AuthCapability {
        let has_hardware = match self.platform.has_hardware().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Hardware query failed, falling back to PIN: {}", e);
                return AuthCapability::default();
            }
        };

        let is_enrolled = match self.platform.is_enrolled().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Enrollment query failed, falling back to PIN: {}", e);
                return AuthCapability::default();
            }
        };

        let capability = AuthCapability {
            has_hardware,
            is_enrolled,
        };
        info!(
            "Capability probe: hardware={}, enrolled={}",
            capability.has_hardware, capability.is_enrolled
        );
        capability
    }
}
