//! Results directory of a training run

use std::path::{Path, PathBuf};

use crate::error::{MadGanError, Result};

/// Layout:
///
/// ```text
/// {root}/log.txt
/// {root}/losses.csv
/// {root}/Results/{iters}_G{g}.{png,csv}
/// {root}/checkpoints/checkpoint_epoch_NNNN/
/// ```
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    /// Create `{parent}/{name}` with its sub-directories
    ///
    /// Fails if the run directory already exists.
    pub fn create(parent: impl AsRef<Path>, name: &str) -> Result<Self> {
        let root = parent.as_ref().join(name);
        if root.exists() {
            return Err(MadGanError::RunDirectoryExists(root));
        }

        std::fs::create_dir_all(&root)?;
        let run = Self { root };
        std::fs::create_dir(run.results_dir())?;
        std::fs::create_dir(run.checkpoints_dir())?;
        Ok(run)
    }

    /// Use an existing directory as output (no layout checks)
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let run = Self {
            root: root.as_ref().to_path_buf(),
        };
        std::fs::create_dir_all(run.results_dir())?;
        std::fs::create_dir_all(run.checkpoints_dir())?;
        Ok(run)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("log.txt")
    }

    pub fn losses_file(&self) -> PathBuf {
        self.root.join("losses.csv")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("Results")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_layout() {
        let parent = TempDir::new().unwrap();
        let run = RunDirectory::create(parent.path(), "degan-GMM-0epc=1").unwrap();

        assert!(run.root().is_dir());
        assert!(run.results_dir().is_dir());
        assert!(run.checkpoints_dir().is_dir());
        assert_eq!(run.log_file(), parent.path().join("degan-GMM-0epc=1").join("log.txt"));
    }

    #[test]
    fn test_existing_run_is_not_overwritten() {
        let parent = TempDir::new().unwrap();
        RunDirectory::create(parent.path(), "run").unwrap();
        let err = RunDirectory::create(parent.path(), "run").unwrap_err();
        assert!(matches!(err, MadGanError::RunDirectoryExists(_)));
    }

    #[test]
    fn test_open_is_idempotent() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("samples");
        RunDirectory::open(&root).unwrap();
        let run = RunDirectory::open(&root).unwrap();
        assert!(run.results_dir().is_dir());
    }
}
