//! Device claim management for fprintd verification.

use crate::error::PlatformError;
use crate::fprintd;
use log::{error, info, warn};

/// RAII-style claim on a fingerprint device.
///
/// Dropping the manager stops any running verification and releases the
/// claim, so an abandoned unlock attempt never leaves the reader locked.
pub struct DeviceManager {
    device: Option<fprintd::Device>,
}

impl DeviceManager {
    /// Acquire and claim the first fingerprint device for the current user.
    pub async fn acquire() -> Result<Self, PlatformError> {
        info!("Acquiring fingerprint device for verification");

        let client = Self::connect_to_fprintd().await?;
        let device = Self::get_first_device(&client).await?;
        Self::claim_device(&device).await?;

        info!("Successfully acquired and claimed fingerprint device");
        Ok(Self {
            device: Some(device),
        })
    }

    /// Get a reference to the managed device.
    pub fn device(&self) -> Result<&fprintd::Device, PlatformError> {
        self.device.as_ref().ok_or(PlatformError::NoDeviceAvailable)
    }

    /// Release the claim now instead of on drop.
    pub async fn release(mut self) {
        if let Some(device) = self.device.take() {
            if let Err(e) = device.release().await {
                warn!("Failed to release device: {}", e);
            } else {
                info!("Successfully released fingerprint device");
            }
        }
    }

    /// Connect to fprintd system bus.
    async fn connect_to_fprintd() -> Result<fprintd::Client, PlatformError> {
        info!("Connecting to fprintd system bus");
        match fprintd::Client::system().await {
            Ok(client) => Ok(client),
            Err(e) => {
                error!("Failed to connect to fprintd system bus: {}", e);
                Err(PlatformError::DBus(e))
            }
        }
    }

    /// Get the first available fingerprint device.
    async fn get_first_device(client: &fprintd::Client) -> Result<fprintd::Device, PlatformError> {
        match fprintd::first_device(client).await {
            Ok(Some(device)) => {
                info!("Found fingerprint device at {}", device.object_path());
                Ok(device)
            }
            Ok(None) => {
                warn!("No fingerprint devices available");
                Err(PlatformError::NoDeviceAvailable)
            }
            Err(e) => {
                error!("Failed to enumerate devices: {}", e);
                Err(PlatformError::DBus(e))
            }
        }
    }

    /// Claim the device for exclusive access.
    async fn claim_device(device: &fprintd::Device) -> Result<(), PlatformError> {
        info!("Claiming fingerprint device for exclusive access");
        match device.claim(fprintd::CURRENT_USER).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to claim device: {}", e);
                Err(PlatformError::ClaimFailed(e.to_string()))
            }
        }
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };

        // Outside a runtime there is nothing to drive the release; fprintd
        // drops the claim itself once our bus connection goes away.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime while dropping device claim; skipping release");
            return;
        };

        info!("Cleaning up abandoned device claim");
        handle.spawn(async move {
            // Harmless when no verification is running.
            let _ = device.verify_stop().await;
            if let Err(e) = device.release().await {
                warn!("Failed to release device during cleanup: {}", e);
            } else {
                info!("Successfully released device during cleanup");
            }
        });
    }
}
