//! Automation session state machine.
//!
//! One login, a strictly sequential pass over the address list, guaranteed
//! teardown. Per-address failures and service-window skips never abort the
//! batch; a login failure aborts it before any address is processed.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use super::{is_within_service_hours, PortalConfig, PortalDriver, PortalError, RequestState};
use crate::models::DownloadedCertificate;
use crate::utils::{certificate_filename, CancelToken};

/// Batch certificate acquisition capability consumed by the orchestrator.
#[async_trait]
pub trait CertificateFetcher: Send {
    /// Fetch one certificate per address into `out_dir`. Skipped and failed
    /// addresses are simply absent from the result.
    async fn fetch_all(
        &mut self,
        addresses: &[String],
        out_dir: &Path,
    ) -> Result<Vec<DownloadedCertificate>, PortalError>;
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Portal session over a step-level driver.
pub struct PortalSession<D: PortalDriver> {
    driver: D,
    config: PortalConfig,
    cancel: CancelToken,
    /// Injectable clock for the service-window gate.
    now: fn() -> NaiveDateTime,
}

impl<D: PortalDriver> PortalSession<D> {
    pub fn new(driver: D, config: PortalConfig) -> Self {
        Self {
            driver,
            config,
            cancel: CancelToken::new(),
            now: local_now,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_clock(mut self, now: fn() -> NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Settle delay between UI steps.
    async fn settle(&self) {
        if self.config.step_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.step_settle_ms)).await;
        }
    }

    /// Run the full per-address flow: Submitting -> AwaitingResult ->
    /// Downloading -> Saved.
    async fn fetch_one(
        &mut self,
        address: &str,
        out_dir: &Path,
    ) -> Result<DownloadedCertificate, PortalError> {
        debug!(address, state = RequestState::Submitting.as_str(), "requesting certificate");
        self.driver.open_registry_search().await?;
        self.settle().await;
        self.driver.submit_address(address).await?;
        self.settle().await;

        debug!(address, state = RequestState::AwaitingResult.as_str(), "request submitted");
        self.driver.request_online_information().await?;
        self.settle().await;

        debug!(address, state = RequestState::Downloading.as_str(), "capturing download");
        let dest = out_dir.join(certificate_filename(address));
        let path = self.driver.download_certificate(&dest).await?;

        Ok(DownloadedCertificate {
            address: address.to_string(),
            path,
            fetched_at: Utc::now(),
        })
    }

    async fn run(
        &mut self,
        addresses: &[String],
        out_dir: &Path,
    ) -> Result<Vec<DownloadedCertificate>, PortalError> {
        info!("logging in to registry portal ({} addresses queued)", addresses.len());
        if let Err(e) = self
            .driver
            .login(&self.config.username, &self.config.password)
            .await
        {
            self.driver.teardown().await;
            return Err(match e {
                auth @ PortalError::Authentication(_) => auth,
                other => PortalError::Authentication(other.to_string()),
            });
        }

        let mut saved = Vec::new();
        let total = addresses.len();

        for (idx, address) in addresses.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.driver.teardown().await;
                return Err(PortalError::Cancelled);
            }

            let now = (self.now)();
            if !is_within_service_hours(now) {
                info!(
                    address,
                    state = RequestState::Skipped.as_str(),
                    "outside service hours at {}, skipping",
                    now.format("%Y-%m-%d %H:%M")
                );
            } else {
                info!("({}/{}) processing {}", idx + 1, total, address);
                match self.fetch_one(address, out_dir).await {
                    Ok(cert) => {
                        info!(
                            address,
                            state = RequestState::Saved.as_str(),
                            "saved certificate to {}",
                            cert.path.display()
                        );
                        saved.push(cert);
                    }
                    Err(e) => {
                        warn!(
                            address,
                            state = RequestState::Failed.as_str(),
                            "certificate request failed: {}",
                            e
                        );
                    }
                }
            }

            // Inter-address spacing, required to avoid portal throttling.
            if idx + 1 < total && self.config.address_delay_secs > 0 {
                debug!("waiting {}s before next address", self.config.address_delay_secs);
                tokio::time::sleep(Duration::from_secs(self.config.address_delay_secs)).await;
            }
        }

        self.driver.teardown().await;
        Ok(saved)
    }
}

#[async_trait]
impl<D: PortalDriver + Sync> CertificateFetcher for PortalSession<D> {
    async fn fetch_all(
        &mut self,
        addresses: &[String],
        out_dir: &Path,
    ) -> Result<Vec<DownloadedCertificate>, PortalError> {
        self.run(addresses, out_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    #[derive(Default)]
    struct FakeState {
        login_ok: bool,
        logged_in: bool,
        torn_down: usize,
        requests: Vec<String>,
        fail_on: Option<String>,
    }

    #[derive(Clone)]
    struct FakeDriver {
        state: Arc<Mutex<FakeState>>,
        current: Option<String>,
    }

    impl FakeDriver {
        fn new(login_ok: bool, fail_on: Option<&str>) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    login_ok,
                    fail_on: fail_on.map(|s| s.to_string()),
                    ..FakeState::default()
                })),
                current: None,
            }
        }
    }

    #[async_trait]
    impl PortalDriver for FakeDriver {
        async fn login(&mut self, _username: &str, _password: &str) -> Result<(), PortalError> {
            let mut state = self.state.lock().unwrap();
            if state.login_ok {
                state.logged_in = true;
                Ok(())
            } else {
                Err(PortalError::Authentication("bad credentials".to_string()))
            }
        }

        async fn open_registry_search(&mut self) -> Result<(), PortalError> {
            Ok(())
        }

        async fn submit_address(&mut self, address: &str) -> Result<(), PortalError> {
            self.current = Some(address.to_string());
            self.state.lock().unwrap().requests.push(address.to_string());
            Ok(())
        }

        async fn request_online_information(&mut self) -> Result<(), PortalError> {
            let state = self.state.lock().unwrap();
            if state.fail_on.as_deref() == self.current.as_deref() {
                return Err(PortalError::Step("unexpected page state".to_string()));
            }
            Ok(())
        }

        async fn download_certificate(&mut self, dest: &Path) -> Result<PathBuf, PortalError> {
            std::fs::write(dest, b"%PDF-1.4 fake").unwrap();
            Ok(dest.to_path_buf())
        }

        async fn teardown(&mut self) {
            self.state.lock().unwrap().torn_down += 1;
        }
    }

    fn open_clock() -> NaiveDateTime {
        // Tuesday 10:00, inside the weekday window
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn closed_clock() -> NaiveDateTime {
        // Saturday 19:00, outside the weekend window
        NaiveDate::from_ymd_opt(2025, 6, 14)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap()
    }

    fn fast_config() -> PortalConfig {
        PortalConfig {
            step_settle_ms: 0,
            address_delay_secs: 0,
            ..PortalConfig::default()
        }
    }

    fn addresses() -> Vec<String> {
        vec![
            "京都市中京区1-1".to_string(),
            "大阪市北区梅田1-1".to_string(),
            "東近江市佐野町801".to_string(),
        ]
    }

    #[tokio::test]
    async fn per_address_failure_does_not_abort_batch() {
        let driver = FakeDriver::new(true, Some("大阪市北区梅田1-1"));
        let state = driver.state.clone();
        let dir = tempfile::tempdir().unwrap();

        let mut session =
            PortalSession::new(driver, fast_config()).with_clock(open_clock);
        let saved = session.fetch_all(&addresses(), dir.path()).await.unwrap();

        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|c| c.path.exists()));
        let state = state.lock().unwrap();
        assert_eq!(state.requests.len(), 3);
        assert_eq!(state.torn_down, 1);
    }

    #[tokio::test]
    async fn login_failure_is_fatal_and_still_tears_down() {
        let driver = FakeDriver::new(false, None);
        let state = driver.state.clone();
        let dir = tempfile::tempdir().unwrap();

        let mut session =
            PortalSession::new(driver, fast_config()).with_clock(open_clock);
        let err = session.fetch_all(&addresses(), dir.path()).await.unwrap_err();

        assert!(matches!(err, PortalError::Authentication(_)));
        let state = state.lock().unwrap();
        assert!(state.requests.is_empty());
        assert_eq!(state.torn_down, 1);
    }

    #[tokio::test]
    async fn out_of_hours_addresses_are_skipped_not_failed() {
        let driver = FakeDriver::new(true, None);
        let state = driver.state.clone();
        let dir = tempfile::tempdir().unwrap();

        let mut session =
            PortalSession::new(driver, fast_config()).with_clock(closed_clock);
        let saved = session.fetch_all(&addresses(), dir.path()).await.unwrap();

        assert!(saved.is_empty());
        let state = state.lock().unwrap();
        assert!(state.requests.is_empty());
        assert_eq!(state.torn_down, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_between_addresses() {
        let driver = FakeDriver::new(true, None);
        let state = driver.state.clone();
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut session = PortalSession::new(driver, fast_config())
            .with_clock(open_clock)
            .with_cancel(cancel);
        let err = session.fetch_all(&addresses(), dir.path()).await.unwrap_err();

        assert!(matches!(err, PortalError::Cancelled));
        let state = state.lock().unwrap();
        assert!(state.requests.is_empty());
        assert_eq!(state.torn_down, 1);
    }

    #[tokio::test]
    async fn saved_filenames_are_derived_from_addresses() {
        let driver = FakeDriver::new(true, None);
        let dir = tempfile::tempdir().unwrap();

        let mut session =
            PortalSession::new(driver, fast_config()).with_clock(open_clock);
        let saved = session
            .fetch_all(&["東近江市 佐野町801".to_string()], dir.path())
            .await
            .unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(
            saved[0].path.file_name().unwrap().to_str().unwrap(),
            "東近江市_佐野町801.pdf"
        );
    }
}
