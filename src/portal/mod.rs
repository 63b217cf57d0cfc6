//! Registry portal automation.
//!
//! The external portal has no API; certificates are fetched by driving its
//! stateful multi-step UI. `PortalDriver` abstracts the per-step browser
//! interaction so the session state machine in `session` can be exercised
//! against a fake driver; `cdp` implements the trait with chromiumoxide.

mod driver;
mod service_hours;
mod session;

#[cfg(feature = "browser")]
mod cdp;
#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

pub use driver::PortalDriver;
pub use service_hours::{is_public_holiday, is_within_service_hours};
pub use session::{CertificateFetcher, PortalSession};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registry portal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal login page.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Run the browser headless (set false for debugging the portal flow).
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Settle delay after each UI step, in milliseconds. The portal updates
    /// pages asynchronously; waits are condition-based but this floor keeps
    /// the inter-step latency the portal expects.
    #[serde(default = "default_step_settle_ms")]
    pub step_settle_ms: u64,
    /// Minimum delay between addresses, in seconds. Below 10 the portal
    /// throttles the session.
    #[serde(default = "default_address_delay_secs")]
    pub address_delay_secs: u64,
    /// Navigation and element-wait timeout in seconds.
    #[serde(default = "default_nav_timeout_secs")]
    pub nav_timeout_secs: u64,
    /// Download completion timeout in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_login_url() -> String {
    "https://xn--udk1b673pynnijsb3h8izqr1a.com/login.php".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_step_settle_ms() -> u64 {
    1000
}
fn default_address_delay_secs() -> u64 {
    10
}
fn default_nav_timeout_secs() -> u64 {
    30
}
fn default_download_timeout_secs() -> u64 {
    60
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            username: String::new(),
            password: String::new(),
            headless: default_headless(),
            step_settle_ms: default_step_settle_ms(),
            address_delay_secs: default_address_delay_secs(),
            nav_timeout_secs: default_nav_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            chrome_args: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PortalError {
    /// Login failed. Fatal for the whole batch; no addresses are processed.
    #[error("portal authentication failed: {0}")]
    Authentication(String),
    /// A single address's UI flow failed. Caught per address; the batch
    /// continues.
    #[error("automation step failed: {0}")]
    Step(String),
    /// Browser launch or protocol failure.
    #[error("browser error: {0}")]
    Browser(String),
    /// The run was cancelled between addresses.
    #[error("automation cancelled")]
    Cancelled,
}

/// Per-address request progress, used for state-transition logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Submitting,
    AwaitingResult,
    Downloading,
    Saved,
    Skipped,
    Failed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::AwaitingResult => "awaiting_result",
            Self::Downloading => "downloading",
            Self::Saved => "saved",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}
