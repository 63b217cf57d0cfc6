//! Portal driver abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::PortalError;

/// One step-level view of the portal UI flow.
///
/// A driver owns exactly one browser session; the session state machine in
/// `session` calls these steps in a fixed order per address. Implementations
/// must be tolerant of being torn down at any point.
#[async_trait]
pub trait PortalDriver: Send {
    /// Navigate to the login page and authenticate. Called once per batch.
    async fn login(&mut self, username: &str, password: &str) -> Result<(), PortalError>;

    /// Select the real-estate-registry-information function and open the
    /// direct-input panel.
    async fn open_registry_search(&mut self) -> Result<(), PortalError>;

    /// Enter the address into the direct-input field and confirm it.
    async fn submit_address(&mut self, address: &str) -> Result<(), PortalError>;

    /// Trigger the online information request and confirm the dialog.
    async fn request_online_information(&mut self) -> Result<(), PortalError>;

    /// Open the item list, select PDF output for the produced item, confirm
    /// the download dialog, and persist the captured download at `dest`.
    async fn download_certificate(&mut self, dest: &Path) -> Result<PathBuf, PortalError>;

    /// Close the browser context and browser. Must not fail; called
    /// unconditionally after the batch, also when login failed.
    async fn teardown(&mut self);
}
