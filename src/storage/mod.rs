use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::pattern::PackagePattern;

/// Access to the package files sitting in the application directory. The
/// directory doubles as the download target; there is no separate cache.
#[derive(Clone, Debug)]
pub struct PackageStore {
    dir: PathBuf,
    pattern: PackagePattern,
}

impl PackageStore {
    pub fn new(dir: PathBuf, pattern: PackagePattern) -> Self {
        Self { dir, pattern }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn package_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// The newest package already on disk, by lexicographically greatest
    /// conventional filename. The fixed-width timestamp token makes name
    /// order equal build order. When file modification times disagree with
    /// that order a warning is logged, but the name still decides.
    pub fn latest_local_filename(&self) -> Option<String> {
        let names = self.matching_files();
        let newest = names.iter().max()?.clone();
        if let Some(by_mtime) = self.newest_by_mtime(&names)
            && by_mtime != newest
        {
            warn!(
                "storage: newest package by name is {newest} but {by_mtime} was written last, trusting the name"
            );
        }
        Some(newest)
    }

    fn matching_files(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("storage: cannot read {}: {err}", self.dir.display());
                return Vec::new();
            }
        };
        let mut names = Vec::new();
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.pattern.matches(name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    fn newest_by_mtime(&self, names: &[String]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| {
                let modified = fs::metadata(self.package_path(name))
                    .and_then(|meta| meta.modified())
                    .ok()?;
                Some((modified, name))
            })
            // Ties on mtime fall back to name order, so same-second writes
            // never count as a disagreement.
            .max()
            .map(|(_, name)| name.clone())
    }
}
