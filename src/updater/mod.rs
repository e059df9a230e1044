use log::{debug, info};

use crate::config::LauncherConfig;
use crate::engine::state::{LaunchFailure, Phase};
use crate::listing;
use crate::networking::NetworkClient;
use crate::pattern;
use crate::storage::PackageStore;

/// The newest package named by the remote listing, under the configured
/// pick rule.
///
/// # Errors
/// Returns an error string when the listing cannot be fetched or names no
/// conventional package at all.
pub async fn latest_remote_filename(
    net: &NetworkClient,
    config: &LauncherConfig,
) -> Result<String, String> {
    let body = net.fetch_listing(&config.listing_url).await?;
    let matches = listing::extract_matches(&body, &config.pattern());
    debug!(
        "update: listing names {} package(s), picking {}",
        matches.len(),
        config.pick.label()
    );
    listing::pick_latest(&matches, config.pick).cloned().ok_or_else(|| {
        format!(
            "no package matching {} found in the listing at {}",
            config.pattern().describe(),
            config.listing_url
        )
    })
}

/// Makes the newest remote package present locally and returns its
/// filename. Downloads only when the remote name differs from the newest
/// local one; a plain string comparison, so any difference triggers a
/// download, even a remote older than the local file.
pub async fn ensure_latest_downloaded<F>(
    net: &NetworkClient,
    store: &PackageStore,
    config: &LauncherConfig,
    mut progress: F,
) -> Result<String, LaunchFailure>
where
    F: FnMut(Phase),
{
    let local = store.latest_local_filename();
    let remote = latest_remote_filename(net, config)
        .await
        .map_err(LaunchFailure::Fetch)?;

    if local.as_deref() == Some(remote.as_str()) {
        info!("update: {remote} is already current, nothing to download");
        return Ok(remote);
    }

    match &local {
        Some(local) => info!("update: replacing {local} with {remote}"),
        None => info!("update: no local package yet, fetching {remote}"),
    }
    if let Some(label) = config
        .pattern()
        .timestamp_token(&remote)
        .and_then(pattern::timestamp_label)
    {
        info!("update: remote package was built {label}");
    }

    let url = config.package_url(&remote);
    let dest = store.package_path(&remote);
    net.download_to_path(&url, &dest, |downloaded, total, speed| {
        let percent = match total {
            Some(total) if total > 0 => downloaded as f32 / total as f32 * 100.0,
            _ => 0.0,
        };
        progress(Phase::Downloading {
            file: remote.clone(),
            progress: percent,
            speed: speed.to_owned(),
        });
    })
    .await
    .map_err(LaunchFailure::Download)?;

    info!("update: downloaded {}", dest.display());
    Ok(remote)
}
