//! Operator registry acquisition.
//!
//! The registry is published as a directory index page linking one or more
//! CSV files. The first CSV link is downloaded into the cache directory under
//! its own file name; a file already cached under that name is reused as-is.
//! When the index or the download fails, the newest CSV already in the cache
//! is used instead. No cached CSV means the registry is unavailable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use healthops_config::RegistryConfig;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use super::common::{build_client, download_to, get_text};
use crate::CliError;

/// Where the registry file used by a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryOrigin {
    /// `registry.path` was set; the network was not touched.
    Explicit,
    Downloaded,
    /// The linked file was already in the cache.
    Cached,
    /// The index or download failed; newest cached CSV used.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySource {
    pub path: PathBuf,
    pub origin: RegistryOrigin,
}

/// First anchor target in `html` whose path ends in `.csv`, case-insensitively.
/// Attribute values come back with entities decoded.
pub fn first_csv_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").ok()?;
    let link = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| {
            let path = href.split(['?', '#']).next().unwrap_or(href);
            path.to_ascii_lowercase().ends_with(".csv")
        })
        .map(str::to_string);
    link
}

/// Most recently modified `*.csv` in `cache_dir`. Ties go to the greater path
/// so the choice does not depend on directory listing order.
pub fn newest_cached_csv(cache_dir: &Path) -> Option<PathBuf> {
    let dir = cache_dir.to_str()?;
    let pattern = format!("{}/*.csv", glob::Pattern::escape(dir));
    glob::glob(&pattern)
        .ok()?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| {
            let modified = fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .max()
        .map(|(_, p)| p)
}

fn file_name_of(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .filter(|s| *s != "." && *s != "..")
        .map(str::to_string)
}

fn download_latest(cfg: &RegistryConfig) -> Result<RegistrySource, String> {
    let index_url = Url::parse(&cfg.url).map_err(|e| format!("invalid registry url '{}': {e}", cfg.url))?;
    let client = build_client(cfg.timeout_secs).map_err(|e| e.message)?;

    let html = get_text(&client, &index_url)?;
    let href = first_csv_link(&html).ok_or_else(|| format!("no CSV link found at {index_url}"))?;
    let file_url = index_url
        .join(&href)
        .map_err(|e| format!("cannot resolve link '{href}': {e}"))?;
    let name = file_name_of(&file_url).ok_or_else(|| format!("link has no file name: {file_url}"))?;

    fs::create_dir_all(&cfg.cache_dir)
        .map_err(|e| format!("cannot create {}: {e}", cfg.cache_dir.display()))?;
    let dest = cfg.cache_dir.join(&name);
    if dest.is_file() {
        log::info!("registry {name} already cached at {}", dest.display());
        return Ok(RegistrySource { path: dest, origin: RegistryOrigin::Cached });
    }

    log::info!("downloading registry {file_url}");
    let bytes = download_to(&client, &file_url, &dest)?;
    log::debug!("wrote {bytes} bytes to {}", dest.display());
    Ok(RegistrySource { path: dest, origin: RegistryOrigin::Downloaded })
}

/// Obtain a local registry CSV. Fails with `EXIT_REGISTRY_UNAVAILABLE` when
/// neither the network nor the cache can supply one.
pub fn acquire(cfg: &RegistryConfig) -> Result<RegistrySource, CliError> {
    if let Some(path) = &cfg.path {
        if path.is_file() {
            log::info!("using registry file {}", path.display());
            return Ok(RegistrySource { path: path.clone(), origin: RegistryOrigin::Explicit });
        }
        return Err(CliError::registry_unavailable(format!(
            "registry file not found: {}",
            path.display()
        )));
    }

    match download_latest(cfg) {
        Ok(source) => Ok(source),
        Err(reason) => {
            log::warn!("registry download failed: {reason}");
            match newest_cached_csv(&cfg.cache_dir) {
                Some(path) => {
                    log::warn!("falling back to cached registry {}", path.display());
                    Ok(RegistrySource { path, origin: RegistryOrigin::Fallback })
                }
                None => Err(CliError::registry_unavailable(format!(
                    "registry unavailable ({reason}) and no cached copy in {}",
                    cfg.cache_dir.display()
                ))),
            }
        }
    }
}
