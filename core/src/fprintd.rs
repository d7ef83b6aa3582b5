//! Async helpers for fprintd D-Bus interface.

use std::fmt;

use futures_util::StreamExt;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use zbus::zvariant::{OwnedObjectPath, Type};
use zbus::{Connection, Proxy};

// D-Bus API Reference:
// BUS_NAME = 'net.reactivated.Fprint'
// MAIN_OBJ = '/net/reactivated/Fprint/Manager'
// MAIN_IFACE = 'net.reactivated.Fprint.Manager'
// DEVICE_IFACE = 'net.reactivated.Fprint.Device'
//
// VALID_VERIFY_STATUS = [
//     'verify-no-match',
//     'verify-match',
//     'verify-retry-scan',
//     'verify-too-fast',
//     'verify-swipe-too-short',
//     'verify-finger-not-centered',
//     'verify-remove-and-retry',
//     'verify-disconnected',
//     'verify-unknown-error'
// ]

/// D-Bus service name for fprintd.
pub const SERVICE: &str = "net.reactivated.Fprint";

/// Manager object path.
pub const MANAGER_PATH: &str = "/net/reactivated/Fprint/Manager";

/// Manager interface name.
pub const IFACE_MANAGER: &str = "net.reactivated.Fprint.Manager";

/// Device interface name.
pub const IFACE_DEVICE: &str = "net.reactivated.Fprint.Device";

/// Error returned by ListEnrolledFingers when the user has no prints.
pub const ERROR_NO_ENROLLED_PRINTS: &str = "net.reactivated.Fprint.Error.NoEnrolledPrints";

/// Error returned by the manager when no reader is attached.
pub const ERROR_NO_SUCH_DEVICE: &str = "net.reactivated.Fprint.Error.NoSuchDevice";

/// Username argument meaning "the caller".
pub const CURRENT_USER: &str = "";

/// Finger name that lets fprintd match against any enrolled print.
pub const ANY_FINGER: &str = "any";

/// Async client with system bus connection.
#[derive(Clone)]
pub struct Client {
    conn: Connection,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Connect to system bus.
    pub async fn system() -> zbus::Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self { conn })
    }

    /// Create Manager helper.
    pub fn manager(&self) -> Manager {
        Manager {
            conn: self.conn.clone(),
        }
    }

    /// Create Device helper for specific path.
    pub fn device(&self, object_path: OwnedObjectPath) -> Device {
        Device {
            conn: self.conn.clone(),
            object_path,
        }
    }
}

/// Manager interface helper.
#[derive(Clone)]
pub struct Manager {
    conn: Connection,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager").finish_non_exhaustive()
    }
}

impl Manager {
    async fn proxy(&self) -> zbus::Result<Proxy<'_>> {
        Proxy::new(&self.conn, SERVICE, MANAGER_PATH, IFACE_MANAGER).await
    }

    /// Generic method call.
    async fn call<R>(
        &self,
        method: &str,
        args: &(impl Serialize + Type + fmt::Debug),
    ) -> zbus::Result<R>
    where
        R: DeserializeOwned + Type,
    {
        let proxy = self.proxy().await?;

        proxy.call(method, args).await
    }

    /// Get device object paths.
    pub async fn get_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>> {
        let (paths,): (Vec<OwnedObjectPath>,) = self.call("GetDevices", &()).await?;
        Ok(paths)
    }

    /// Get default device path.
    pub async fn get_default_device(&self) -> zbus::Result<OwnedObjectPath> {
        let (path,): (OwnedObjectPath,) = self.call("GetDefaultDevice", &()).await?;
        Ok(path)
    }
}

/// Device interface helper.
#[derive(Clone)]
pub struct Device {
    conn: Connection,
    object_path: OwnedObjectPath,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("object_path", &self.object_path)
            .finish()
    }
}

impl Device {
    async fn proxy(&self) -> zbus::Result<Proxy<'_>> {
        Proxy::new(&self.conn, SERVICE, self.object_path.as_str(), IFACE_DEVICE).await
    }

    /// Get device object path.
    pub fn object_path(&self) -> &str {
        self.object_path.as_str()
    }

    /// Generic method call.
    async fn call<R>(
        &self,
        method: &str,
        args: &(impl Serialize + Type + fmt::Debug),
    ) -> zbus::Result<R>
    where
        R: DeserializeOwned + Type,
    {
        let proxy = self.proxy().await?;

        proxy.call(method, args).await
    }

    /// List enrolled fingers for user ("" for current user).
    pub async fn list_enrolled_fingers(&self, username: &str) -> zbus::Result<Vec<String>> {
        let (fingers,): (Vec<String>,) = self.call("ListEnrolledFingers", &(username,)).await?;
        Ok(fingers)
    }

    /// Start verification for finger.
    pub async fn verify_start(&self, finger: &str) -> zbus::Result<()> {
        let _: () = self.call("VerifyStart", &(finger,)).await?;
        Ok(())
    }

    /// Stop verification.
    pub async fn verify_stop(&self) -> zbus::Result<()> {
        let _: () = self.call("VerifyStop", &()).await?;
        Ok(())
    }

    /// Claim device for user ("" for current user).
    pub async fn claim(&self, username: &str) -> zbus::Result<()> {
        let _: () = self.call("Claim", &(username,)).await?;
        Ok(())
    }

    /// Release device.
    pub async fn release(&self) -> zbus::Result<()> {
        let _: () = self.call("Release", &()).await?;
        Ok(())
    }

    /// Run one verification (requires claimed device) and return the final status.
    ///
    /// The VerifyStatus subscription is set up before VerifyStart so the
    /// terminal signal can't be missed. Intermediate statuses are passed to
    /// `on_progress`.
    pub async fn verify<F>(&self, finger: &str, mut on_progress: F) -> zbus::Result<VerifyResult>
    where
        F: FnMut(VerifyResult) + Send,
    {
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_signal("VerifyStatus").await?;

        self.verify_start(finger).await?;

        while let Some(msg) = stream.next().await {
            let (result, done): (String, bool) = msg.body().deserialize()?;
            let status = VerifyResult::parse(&result);
            debug!("VerifyStatus: result='{}', done={}", result, done);

            if done {
                if let Err(e) = self.verify_stop().await {
                    debug!("VerifyStop after completion failed: {}", e);
                }
                return Ok(status);
            }

            on_progress(status);
        }

        Err(zbus::Error::Failure(
            "VerifyStatus signal stream closed".to_string(),
        ))
    }
}

/// Parsed VerifyStatus result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Match,
    NoMatch,
    /// Scan quality problem; the reader keeps waiting.
    Retry(String),
    Disconnected,
    UnknownError,
    Other(String),
}

impl VerifyResult {
    /// Parse a fprintd VerifyStatus result string.
    pub fn parse(result: &str) -> Self {
        match result {
            "verify-match" => VerifyResult::Match,
            "verify-no-match" => VerifyResult::NoMatch,
            "verify-retry-scan"
            | "verify-too-fast"
            | "verify-swipe-too-short"
            | "verify-finger-not-centered"
            | "verify-remove-and-retry" => VerifyResult::Retry(result.to_string()),
            "verify-disconnected" => VerifyResult::Disconnected,
            "verify-unknown-error" => VerifyResult::UnknownError,
            other => VerifyResult::Other(other.to_string()),
        }
    }
}

/// Check whether a D-Bus error is the named fprintd error.
pub fn is_error(err: &zbus::Error, name: &str) -> bool {
    match err {
        zbus::Error::MethodError(error_name, _, _) => error_name.as_str() == name,
        _ => false,
    }
}

/// Find first available device.
pub async fn first_device(client: &Client) -> zbus::Result<Option<Device>> {
    let mgr = client.manager();

    // Try default device first
    if let Ok(path) = mgr.get_default_device().await {
        return Ok(Some(client.device(path)));
    }

    // Fall back to first enumerated device
    let paths = mgr.get_devices().await?;
    Ok(paths.first().map(|path| client.device(path.clone())))
}
