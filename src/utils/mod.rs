//! Small shared helpers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Create a directory (and parents) if absent, returning its path.
pub fn ensure_dir(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

/// Deterministic certificate filename for an address: spaces become
/// underscores, slashes become hyphens.
pub fn certificate_filename(address: &str) -> String {
    let name = address.replace(' ', "_").replace('/', "-");
    format!("{name}.pdf")
}

/// Cooperative cancellation flag, checked between pipeline stages and
/// between per-address portal iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_replaces_spaces_and_slashes() {
        assert_eq!(
            certificate_filename("東近江市 佐野町801/2"),
            "東近江市_佐野町801-2.pdf"
        );
        assert_eq!(certificate_filename("京都市中京区1-1"), "京都市中京区1-1.pdf");
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
