use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::env;
use crate::listing::RemotePick;
use crate::pattern::PackagePattern;

/// On-disk configuration, read from `splashup.json` next to the launcher.
/// Every field is optional in the file; command-line flags override it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub product: Option<String>,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub dir: Option<PathBuf>,
    pub runner: Option<Vec<String>>,
    pub pick: Option<String>,
}

/// Command-line values layered over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub product: Option<String>,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub dir: Option<PathBuf>,
    pub runner: Option<String>,
    pub pick: Option<String>,
}

/// Fully resolved launcher configuration.
#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub product: String,
    /// Directory-listing URL, stored without a trailing slash.
    pub listing_url: String,
    pub extension: String,
    pub install_dir: PathBuf,
    /// Program prefix the package is executed through, e.g. ["java", "-jar"].
    /// Empty means the package file is executed directly.
    pub runner: Vec<String>,
    pub pick: RemotePick,
}

impl LauncherConfig {
    pub fn pattern(&self) -> PackagePattern {
        PackagePattern::new(&self.product, &self.extension)
    }

    pub fn package_url(&self, filename: &str) -> String {
        format!("{}/{}", self.listing_url, filename)
    }
}

/// Loads the configuration file (required only when a path was given
/// explicitly), layers the command-line overrides on top and validates the
/// result.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<LauncherConfig, String> {
    let required = path.is_some();
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(env::default_config_path);
    let file = read_config_file(&path, required)?;
    resolve(file, overrides)
}

fn read_config_file(path: &Path, required: bool) -> Result<ConfigFile, String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            debug!("config: no file at {}, using flags only", path.display());
            return Ok(ConfigFile::default());
        }
        Err(err) => return Err(format!("failed to read {}: {err}", path.display())),
    };
    serde_json::from_slice(&bytes).map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn resolve(file: ConfigFile, overrides: Overrides) -> Result<LauncherConfig, String> {
    let product = overrides
        .product
        .or(file.product)
        .ok_or("no product name configured (set \"product\" in splashup.json or pass --product)")?;
    if product.trim().is_empty() {
        return Err("product name must not be empty".to_owned());
    }

    let url = overrides
        .url
        .or(file.url)
        .ok_or("no listing URL configured (set \"url\" in splashup.json or pass --url)")?;
    let listing_url = url.trim_end_matches('/').to_owned();
    if listing_url.is_empty() {
        return Err("listing URL must not be empty".to_owned());
    }

    let extension = overrides
        .ext
        .or(file.ext)
        .ok_or("no package extension configured (set \"ext\" in splashup.json or pass --ext)")?;
    if extension.trim_matches('.').is_empty() {
        return Err("package extension must not be empty".to_owned());
    }

    let install_dir = overrides
        .dir
        .or(file.dir)
        .unwrap_or_else(env::launcher_dir);

    let runner = match overrides.runner {
        Some(joined) => joined.split(',').map(str::to_owned).collect(),
        None => file.runner.unwrap_or_default(),
    };
    if runner.iter().any(|entry| entry.trim().is_empty()) {
        return Err("runner entries must not be empty".to_owned());
    }

    let pick = match overrides.pick.or(file.pick) {
        Some(value) => RemotePick::parse(&value)
            .ok_or_else(|| format!("unknown pick rule \"{value}\" (expected by-name or last-listed)"))?,
        None => RemotePick::default(),
    };

    Ok(LauncherConfig {
        product,
        listing_url,
        extension,
        install_dir,
        runner,
        pick,
    })
}
