use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name used for the local journal's cursor.
pub const LOCAL_CURSOR_NAME: &str = "local";

/// Per-source file holding the last fully processed cursor.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    current: Option<String>,
}

impl CursorStore {
    /// Opens the store for `name` inside `dir` and reads the stored cursor.
    ///
    /// A missing, unreadable or empty file means "no cursor".
    pub fn open(dir: &Path, name: &str) -> Self {
        let path = dir.join(name);
        let current = match fs::read_to_string(&path) {
            Ok(text) => {
                let token = text.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cursor file");
                None
            }
        };

        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Overwrites the stored cursor. Writing the cursor that is already
    /// stored is a no-op.
    pub fn update(&mut self, cursor: &str) -> io::Result<()> {
        if self.current.as_deref() == Some(cursor) {
            return Ok(());
        }
        fs::write(&self.path, cursor)?;
        self.current = Some(cursor.to_string());
        Ok(())
    }
}
