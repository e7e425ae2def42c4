use std::path::{Path, PathBuf};

/// Cooperative cancellation, polled once after every persisted step.
pub trait CancelCheck {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelCheck for F
where
    F: Fn() -> bool,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

// Cancellation is requested by dropping a `.cancel` file next to the project
#[derive(Debug, Clone)]
pub struct CancelFile {
    path: PathBuf,
}

impl CancelFile {
    pub const FILE_NAME: &'static str = ".cancel";

    pub fn for_project(project_path: &Path) -> Self {
        let dir = project_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        CancelFile {
            path: dir.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes a cancel request left over from an earlier run.
    pub fn clear_stale(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl CancelCheck for CancelFile {
    fn is_cancelled(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    #[test]
    fn test_cancel_file_appears() {
        let dir = tempdir().unwrap();
        let cancel = CancelFile::for_project(&dir.path().join("case.db"));
        assert_eq!(cancel.path(), dir.path().join(".cancel"));
        assert!(!cancel.is_cancelled());
        std::fs::write(cancel.path(), b"").unwrap();
        assert!(cancel.is_cancelled());

        assert!(cancel.clear_stale().unwrap());
        assert!(!cancel.is_cancelled());
        assert!(!cancel.clear_stale().unwrap());
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let cancel = CancelFile::for_project(Path::new("case.db"));
        assert_eq!(cancel.path(), Path::new("./.cancel"));
    }

    #[test]
    fn test_closure_counts_polls() {
        let polls = Cell::new(0);
        let check = || {
            polls.set(polls.get() + 1);
            polls.get() >= 3
        };
        assert!(!check.is_cancelled());
        assert!(!check.is_cancelled());
        assert!(check.is_cancelled());
    }
}
