//! Shared HTTP plumbing for registry acquisition.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::CliError;

pub(super) const USER_AGENT: &str = concat!("healthops/", env!("CARGO_PKG_VERSION"));

/// Blocking client with one overall timeout per request.
pub(super) fn build_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, CliError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CliError::general(format!("failed to build HTTP client: {e}")))
}

fn get_checked(
    client: &reqwest::blocking::Client,
    url: &url::Url,
) -> Result<reqwest::blocking::Response, String> {
    let resp = client
        .get(url.clone())
        .send()
        .map_err(|e| format!("GET {url}: {e}"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("GET {url}: HTTP {}", status.as_u16()));
    }
    Ok(resp)
}

pub(super) fn get_text(client: &reqwest::blocking::Client, url: &url::Url) -> Result<String, String> {
    get_checked(client, url)?
        .text()
        .map_err(|e| format!("GET {url}: cannot read body: {e}"))
}

/// Download `url` to `dest`. The body lands in a `.part` sibling first, so an
/// interrupted transfer never leaves a truncated file under the final name.
pub(super) fn download_to(
    client: &reqwest::blocking::Client,
    url: &url::Url,
    dest: &Path,
) -> Result<u64, String> {
    let bytes = get_checked(client, url)?
        .bytes()
        .map_err(|e| format!("GET {url}: cannot read body: {e}"))?;

    let part = dest.with_extension("part");
    let mut file = fs::File::create(&part).map_err(|e| format!("{}: {e}", part.display()))?;
    file.write_all(&bytes)
        .map_err(|e| format!("{}: {e}", part.display()))?;
    file.flush().map_err(|e| format!("{}: {e}", part.display()))?;
    drop(file);
    fs::rename(&part, dest).map_err(|e| format!("{}: {e}", dest.display()))?;
    Ok(bytes.len() as u64)
}
