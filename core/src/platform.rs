//! Biometric platform boundary.
//!
//! The gate only talks to [`BiometricPlatform`]; [`FprintdPlatform`] is the
//! production implementation and tests substitute fakes.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::device::DeviceManager;
use crate::error::PlatformError;
use crate::fprintd::{self, VerifyResult};

/// Settings for one biometric prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub prompt_message: String,
    pub cancel_label: String,
    pub allow_device_fallback: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        crate::config::AuthConfig::default().prompt()
    }
}

/// What the platform reported for a completed biometric prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiometricOutcome {
    Success,
    Cancelled,
    /// Presented fingerprint was rejected.
    Failed(String),
}

/// Host biometric capability.
#[async_trait]
pub trait BiometricPlatform: Send + Sync {
    /// Whether a biometric sensor is present.
    async fn has_hardware(&self) -> Result<bool, PlatformError>;

    /// Whether the current user has an enrolled biometric credential.
    async fn is_enrolled(&self) -> Result<bool, PlatformError>;

    /// Run one verification and wait for its outcome.
    async fn authenticate(&self, config: &PromptConfig) -> Result<BiometricOutcome, PlatformError>;
}

/// fprintd on the system bus, checking the calling user's prints.
#[derive(Debug, Clone, Default)]
pub struct FprintdPlatform;

impl FprintdPlatform {
    pub fn new() -> Self {
        Self
    }
}

/// Map a `ListEnrolledFingers` reply onto "is anything enrolled".
fn enrollment_from(reply: zbus::Result<Vec<String>>) -> Result<bool, PlatformError> {
    match reply {
        Ok(fingers) => {
            info!("Found {} enrolled fingerprint(s)", fingers.len());
            Ok(!fingers.is_empty())
        }
        Err(e) if fprintd::is_error(&e, fprintd::ERROR_NO_ENROLLED_PRINTS) => {
            info!("No enrolled fingerprints for current user");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BiometricPlatform for FprintdPlatform {
    async fn has_hardware(&self) -> Result<bool, PlatformError> {
        let client = fprintd::Client::system().await?;
        match fprintd::first_device(&client).await {
            Ok(Some(device)) => {
                debug!("Fingerprint reader present at {}", device.object_path());
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) if fprintd::is_error(&e, fprintd::ERROR_NO_SUCH_DEVICE) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_enrolled(&self) -> Result<bool, PlatformError> {
        let client = fprintd::Client::system().await?;
        let Some(device) = fprintd::first_device(&client).await? else {
            return Ok(false);
        };

        enrollment_from(device.list_enrolled_fingers(fprintd::CURRENT_USER).await)
    }

    async fn authenticate(&self, config: &PromptConfig) -> Result<BiometricOutcome, PlatformError> {
        info!("Starting fingerprint verification: '{}'", config.prompt_message);

        let manager = DeviceManager::acquire().await?;
        let result = manager
            .device()?
            .verify(fprintd::ANY_FINGER, |progress| {
                debug!("Verification in progress: {:?}", progress);
            })
            .await;
        manager.release().await;

        match result? {
            VerifyResult::Match => Ok(BiometricOutcome::Success),
            VerifyResult::NoMatch => Ok(BiometricOutcome::Failed("verify-no-match".to_string())),
            VerifyResult::Disconnected => {
                Err(PlatformError::Device("verify-disconnected".to_string()))
            }
            VerifyResult::UnknownError => {
                Err(PlatformError::Device("verify-unknown-error".to_string()))
            }
            VerifyResult::Retry(status) | VerifyResult::Other(status) => {
                warn!("Verification finished with unexpected status '{}'", status);
                Err(PlatformError::Device(status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fprintd::tests::method_error;

    #[test]
    fn enrolled_fingers_mean_enrolled() {
        assert!(enrollment_from(Ok(vec!["right-index-finger".to_string()])).unwrap());
        assert!(!enrollment_from(Ok(Vec::new())).unwrap());
    }

    #[test]
    fn no_enrolled_prints_is_not_an_error() {
        let reply = Err(method_error(fprintd::ERROR_NO_ENROLLED_PRINTS));
        assert!(!enrollment_from(reply).unwrap());
    }

    #[test]
    fn other_fprintd_errors_are_platform_errors() {
        let reply = Err(method_error("net.reactivated.Fprint.Error.PermissionDenied"));
        assert!(matches!(enrollment_from(reply), Err(PlatformError::DBus(_))));

        let reply = Err(zbus::Error::Failure("bus went away".to_string()));
        assert!(matches!(enrollment_from(reply), Err(PlatformError::DBus(_))));
    }
}
