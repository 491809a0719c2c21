use std::fs;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::{Arc, Mutex};

use eyre::{Result, eyre};

use crate::types::ChatMessage;

const HISTORY_FILE: &str = "chat_history.json";

/// Where the conversation survives between sessions.
///
/// The whole conversation is written on every change; there is no
/// incremental update.
pub trait MessageStore {
    /// Saved conversation, or an empty one if nothing was saved.
    fn load(&self) -> Result<Vec<ChatMessage>>;

    fn save(&self, messages: &[ChatMessage]) -> Result<()>;

    /// Forget the saved conversation entirely.
    fn clear(&self) -> Result<()>;
}

/// Keeps the conversation as one JSON array in a file.
pub struct FileMessageStore {
    path: PathBuf,
}

impl FileMessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user's data directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| eyre!("Could not determine the user data directory"))?;
        Ok(Self::new(dir.join("gemini-web-chat").join(HISTORY_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MessageStore for FileMessageStore {
    fn load(&self) -> Result<Vec<ChatMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| eyre!("Failed to read {}: {}", self.path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| eyre!("Failed to parse {}: {}", self.path.display(), e))
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| eyre!("Failed to create directory {}: {}", parent.display(), e))?;
            }
        }

        // Write beside the target and rename, so a crash never leaves half a file.
        let staging = self.staging_path();
        let content = serde_json::to_string(messages)?;
        fs::write(&staging, content)
            .map_err(|e| eyre!("Failed to write {}: {}", staging.display(), e))?;
        fs::rename(&staging, &self.path)
            .map_err(|e| eyre!("Failed to replace {}: {}", self.path.display(), e))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| eyre!("Failed to remove {}: {}", self.path.display(), e))?;
        }
        Ok(())
    }
}

/// In-process store; clones share the same slot.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    saved: Arc<Mutex<Option<Vec<ChatMessage>>>>,
}

#[cfg(test)]
impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The saved conversation, `None` when nothing is stored.
    pub fn snapshot(&self) -> Option<Vec<ChatMessage>> {
        self.saved.lock().ok().and_then(|saved| saved.clone())
    }
}

#[cfg(test)]
impl MessageStore for MemoryMessageStore {
    fn load(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| eyre!("message store lock poisoned"))?;
        *saved = Some(messages.to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| eyre!("message store lock poisoned"))?;
        *saved = None;
        Ok(())
    }
}
