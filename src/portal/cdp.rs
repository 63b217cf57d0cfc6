//! Chromium (CDP) portal driver.
//!
//! Drives the registry portal UI over the DevTools protocol. The portal
//! renders its workflow inside named iframes and updates panels
//! asynchronously, so every interaction goes through evaluated JavaScript
//! scoped to the right frame document, and progress is detected by polling
//! for the expected element instead of fixed sleeps.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{PortalConfig, PortalDriver, PortalError};

/// Search panel iframe name.
const SEARCH_FRAME: &str = "touki_search-iframe-frame";
/// Result/my-page list iframe name.
const LIST_FRAME: &str = "mypage_list-iframe-frame";

/// Poll interval for wait-for-element conditions.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct CdpDriver {
    config: PortalConfig,
    browser: Option<Browser>,
    page: Option<Page>,
}

impl CdpDriver {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: PortalConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    fn find_chrome() -> Result<PathBuf, PortalError> {
        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(PortalError::Browser(
            "Chrome/Chromium not found (install chromium or google-chrome)".to_string(),
        ))
    }

    async fn ensure_browser(&mut self) -> Result<(), PortalError> {
        if self.browser.is_some() {
            return Ok(());
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            // with_head means NOT headless, confusingly
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| PortalError::Browser(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PortalError::Browser(format!("failed to launch browser: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        Ok(())
    }

    fn page(&self) -> Result<&Page, PortalError> {
        self.page
            .as_ref()
            .ok_or_else(|| PortalError::Step("no active page (not logged in)".to_string()))
    }

    /// JS expression resolving the working document: the top document or a
    /// named iframe's content document.
    fn doc_expr(frame: Option<&str>) -> String {
        match frame {
            None => "document".to_string(),
            Some(name) => format!(
                "(document.querySelector('iframe[name=\"{name}\"]') || {{}}).contentDocument"
            ),
        }
    }

    async fn eval_bool(&self, script: String) -> Result<bool, PortalError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| PortalError::Step(format!("script evaluation failed: {}", e)))?;
        result
            .into_value::<bool>()
            .map_err(|e| PortalError::Step(format!("unexpected script result: {}", e)))
    }

    /// Poll until a script evaluates to true, bounded by the nav timeout.
    async fn wait_until(&self, condition: &str, what: &str) -> Result<(), PortalError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.nav_timeout_secs);
        let script = format!("(() => {{ try {{ return !!({condition}); }} catch (e) {{ return false; }} }})()");
        loop {
            if self.eval_bool(script.clone()).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PortalError::Step(format!("timed out waiting for {}", what)));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the first element matching a CSS selector.
    async fn click(&self, frame: Option<&str>, selector: &str) -> Result<(), PortalError> {
        let doc = Self::doc_expr(frame);
        let condition = format!("{doc} && {doc}.querySelector('{selector}')");
        self.wait_until(&condition, selector).await?;
        let script = format!(
            "(() => {{ const el = {doc}.querySelector('{selector}'); if (!el) return false; el.click(); return true; }})()"
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(PortalError::Step(format!("element not found: {}", selector)))
        }
    }

    /// Click a button-like element by its visible label.
    async fn click_by_text(&self, frame: Option<&str>, label: &str) -> Result<(), PortalError> {
        let doc = Self::doc_expr(frame);
        let finder = format!(
            "Array.from(({doc} || document.createElement('div')).querySelectorAll('button, a, span, div[role=\"button\"]')).find(el => el.textContent.trim() === '{label}')"
        );
        self.wait_until(&finder, label).await?;
        let script = format!(
            "(() => {{ const el = {finder}; if (!el) return false; el.click(); return true; }})()"
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(PortalError::Step(format!("button not found: {}", label)))
        }
    }

    /// Fill an input field and fire its input event.
    async fn fill(&self, frame: Option<&str>, selector: &str, value: &str) -> Result<(), PortalError> {
        let doc = Self::doc_expr(frame);
        let condition = format!("{doc} && {doc}.querySelector('{selector}')");
        self.wait_until(&condition, selector).await?;
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        let script = format!(
            "(() => {{ const el = {doc}.querySelector('{selector}'); if (!el) return false; el.value = '{escaped}'; el.dispatchEvent(new Event('input', {{bubbles: true}})); el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()"
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(PortalError::Step(format!("input not found: {}", selector)))
        }
    }

    /// Route captured downloads into `dir`.
    async fn allow_downloads_into(&self, dir: &Path) -> Result<(), PortalError> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(PortalError::Browser)?;
        self.page()?
            .execute(params)
            .await
            .map_err(|e| PortalError::Browser(format!("failed to set download behavior: {}", e)))?;
        Ok(())
    }

    /// Wait for a new, fully-written PDF to appear in `dir`.
    async fn wait_for_download(
        &self,
        dir: &Path,
        before: &[PathBuf],
    ) -> Result<PathBuf, PortalError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.download_timeout_secs);
        loop {
            for entry in std::fs::read_dir(dir)
                .map_err(|e| PortalError::Step(format!("cannot read download dir: {}", e)))?
                .flatten()
            {
                let path = entry.path();
                let is_pdf = path.extension().map(|e| e == "pdf").unwrap_or(false);
                if is_pdf && !before.contains(&path) {
                    return Ok(path);
                }
            }
            if Instant::now() >= deadline {
                return Err(PortalError::Step("timed out waiting for download".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn list_pdfs(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().map(|e| e == "pdf").unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl PortalDriver for CdpDriver {
    async fn login(&mut self, username: &str, password: &str) -> Result<(), PortalError> {
        self.ensure_browser().await?;

        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| PortalError::Browser("browser not running".to_string()))?;
        let page = browser
            .new_page(self.config.login_url.as_str())
            .await
            .map_err(|e| PortalError::Browser(format!("failed to open login page: {}", e)))?;
        self.page = Some(page);

        self.wait_until(
            "document.readyState === 'complete' || document.readyState === 'interactive'",
            "login page",
        )
        .await
        .map_err(|e| PortalError::Authentication(e.to_string()))?;

        let result: Result<(), PortalError> = async {
            self.fill(None, "input[name=\"id\"]", username).await?;
            self.fill(None, "input[name=\"pass\"]", password).await?;
            self.click_by_text(None, "利用規約に同意してログイン").await?;
            // The function grid only renders once the session is accepted.
            self.wait_until(
                "document.body && document.body.textContent.includes('不動産登記情報取得')",
                "post-login function grid",
            )
            .await
        }
        .await;

        result.map_err(|e| PortalError::Authentication(e.to_string()))
    }

    async fn open_registry_search(&mut self) -> Result<(), PortalError> {
        self.click_by_text(None, "不動産登記情報取得").await?;
        // The search panel loads into its own iframe.
        self.wait_until(
            &format!("{} && {}.readyState !== 'loading'", Self::doc_expr(Some(SEARCH_FRAME)), Self::doc_expr(Some(SEARCH_FRAME))),
            "search iframe",
        )
        .await?;
        self.click(Some(SEARCH_FRAME), "#check_direct_enable-inputEl").await
    }

    async fn submit_address(&mut self, address: &str) -> Result<(), PortalError> {
        self.fill(Some(SEARCH_FRAME), "#direct_txt-inputEl", address).await?;
        self.click_by_text(Some(SEARCH_FRAME), "直接入力取込").await?;
        self.click_by_text(Some(SEARCH_FRAME), "確定").await?;
        self.click(Some(SEARCH_FRAME), "img").await
    }

    async fn request_online_information(&mut self) -> Result<(), PortalError> {
        self.click_by_text(Some(SEARCH_FRAME), "登記情報取得（オンライン）").await?;
        self.click_by_text(Some(SEARCH_FRAME), "はい").await?;
        self.click(Some(SEARCH_FRAME), "#button-1005-btnEl").await
    }

    async fn download_certificate(&mut self, dest: &Path) -> Result<PathBuf, PortalError> {
        let dir = dest
            .parent()
            .ok_or_else(|| PortalError::Step("destination has no parent directory".to_string()))?
            .to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| PortalError::Step(format!("cannot create output dir: {}", e)))?;

        self.allow_downloads_into(&dir).await?;
        let before = Self::list_pdfs(&dir);

        self.click(Some(LIST_FRAME), "#ext-gen1323 button").await?;
        self.click_by_text(Some(LIST_FRAME), "はい").await?;

        let downloaded = self.wait_for_download(&dir, &before).await?;
        if downloaded != dest {
            std::fs::rename(&downloaded, dest)
                .map_err(|e| PortalError::Step(format!("cannot move download: {}", e)))?;
        }
        debug!("certificate saved at {}", dest.display());
        Ok(dest.to_path_buf())
    }

    async fn teardown(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("browser close failed: {}", e);
            }
        }
    }
}
