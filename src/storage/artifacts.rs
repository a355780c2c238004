//! Artifact file layout and all-or-nothing artifact writes.
//!
//! Layout under the models directory:
//!
//! ```text
//! <models_dir>/scikit-learn/<name>_<version>.bin
//! <models_dir>/pytorch/<name>_<version>.pt
//! <models_dir>/tensorflow/<name>_<version>
//! ```

use crate::error::{Error, Result};
use crate::models::Framework;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Identifier of one trained artifact, `<name>_<version>`.
pub fn model_id(name: &str, version: &str) -> String {
    format!("{}_{}", name, version)
}

/// Derives artifact paths from `(framework, name, version)`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn framework_dir(&self, framework: Framework) -> PathBuf {
        self.root.join(framework.as_str())
    }

    pub fn path(&self, framework: Framework, name: &str, version: &str) -> PathBuf {
        let id = model_id(name, version);
        let file = match framework.artifact_extension() {
            Some(ext) => format!("{}.{}", id, ext),
            None => id,
        };
        self.framework_dir(framework).join(file)
    }

    /// Create the per-framework directories.
    pub fn ensure_layout(&self) -> Result<()> {
        for framework in Framework::ALL {
            fs::create_dir_all(self.framework_dir(framework))?;
        }
        Ok(())
    }

    /// Reserve a temporary path next to the final artifact location.
    pub fn stage(&self, framework: Framework, name: &str, version: &str) -> Result<ArtifactGuard> {
        let dest = self.path(framework, name, version);
        let dir = self.framework_dir(framework);
        fs::create_dir_all(&dir)?;
        let temp = dir.join(format!(
            ".{}.{:016x}.tmp",
            model_id(name, version),
            rand::random::<u64>()
        ));
        Ok(ArtifactGuard {
            temp,
            dest,
            installed: false,
            kept: false,
        })
    }
}

/// Owns an artifact until the registry has recorded it.
///
/// Dropping the guard removes the temporary file and, once installed, the
/// final artifact as well, unless [`ArtifactGuard::keep`] was called.
#[derive(Debug)]
pub struct ArtifactGuard {
    temp: PathBuf,
    dest: PathBuf,
    installed: bool,
    kept: bool,
}

impl ArtifactGuard {
    /// Where the backend should write the artifact.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn path(&self) -> &Path {
        &self.dest
    }

    /// Move the written artifact into its final location.
    pub fn install(&mut self) -> Result<()> {
        if !self.temp.exists() {
            return Err(Error::internal(format!(
                "Artifact was not written: {}",
                self.temp.display()
            )));
        }
        fs::rename(&self.temp, &self.dest).map_err(|e| {
            Error::internal(format!("Failed to install artifact {}: {}", self.dest.display(), e))
        })?;
        self.installed = true;
        debug!("Installed artifact {}", self.dest.display());
        Ok(())
    }

    /// The registry references this artifact now; leave it in place.
    pub fn keep(mut self) {
        self.kept = true;
    }
}

fn remove_path(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => debug!("Removed uncommitted artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove uncommitted artifact {}: {}", path.display(), e),
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        remove_path(&self.temp);
        if self.installed {
            remove_path(&self.dest);
        }
    }
}
