//! Ownership of ephemeral working files
//!
//! A [`ScratchFiles`] guard removes every file it tracks when dropped, so
//! descriptors, masks, footprint shapefiles and temporaries disappear on
//! every exit path of a tile or block, including early returns on error.
//! Files that became final output are released with [`ScratchFiles::keep`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

#[derive(Debug, Default)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        ScratchFiles { paths: Vec::new() }
    }

    /// Track one file and return its path
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path.clone());
        }
        path
    }

    /// Track several files
    pub fn track_all<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            self.track(path);
        }
    }

    /// Stop tracking `path`; it survives the guard
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|tracked| tracked != path);
    }

    /// Stop tracking every file
    pub fn release(&mut self) {
        self.paths.clear();
    }

    /// Remove every tracked file now
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}
