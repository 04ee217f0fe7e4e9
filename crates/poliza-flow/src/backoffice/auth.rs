use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

/// Source of the bearer token attached to every back-office request.
pub trait TokenProvider: Debug + Send + Sync {
    fn bearer_token(&self) -> Option<String>;
    /// Forget the token after the back office rejected it.
    fn invalidate(&self);
}

/// In-memory token, used by tests and one-off runs.
#[derive(Debug, Default)]
pub struct StaticToken {
    token: Mutex<Option<String>>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
    }
}

/// Token persisted in a file between runs. The file is read once when the
/// store is opened; later reads come from memory. Invalidation deletes the file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    token: Mutex<Option<String>>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = read_token(&path);
        debug!(path = %path.display(), loaded = token.is_some(), "opened token store");
        Self {
            path,
            token: Mutex::new(token),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, token: &str) -> io::Result<()> {
        let token = token.trim();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.to_string()).filter(|token| !token.is_empty());
        }
        debug!(path = %self.path.display(), "stored back-office token");
        Ok(())
    }
}

fn read_token(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl TokenProvider for FileTokenStore {
    fn bearer_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed rejected token"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "could not remove token file"),
        }
    }
}
