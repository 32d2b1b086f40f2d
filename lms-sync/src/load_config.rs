/// `load_config` module: loads the static YAML config and injects the Valence
/// credentials from the environment.
///
/// # Responsibilities
/// - Parse the YAML file into [`RawConfig`]
/// - Read `VALENCE_APP_ID`, `VALENCE_APP_KEY`, `VALENCE_USER_ID` and `VALENCE_USER_KEY`
/// - Validate every field, each failure with its own message
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::auth::Credentials;

pub const APP_ID_VAR: &str = "VALENCE_APP_ID";
pub const APP_KEY_VAR: &str = "VALENCE_APP_KEY";
pub const USER_ID_VAR: &str = "VALENCE_USER_ID";
pub const USER_KEY_VAR: &str = "VALENCE_USER_KEY";

const MAX_CREDENTIAL_LEN: usize = 100;
const MAX_PATH_LEN: usize = 200;

/// The YAML side of the config; no secrets.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub instance_domain: String,
    pub org_unit_id: i64,
    pub content_directory: PathBuf,
    pub manifest_path: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
    #[serde(default)]
    pub clock_skew_seconds: i64,
}

fn default_render_timeout_ms() -> u64 {
    3000
}

#[derive(Debug)]
pub struct CliConfig {
    pub instance_url: Url,
    pub org_unit_id: i64,
    pub content_directory: PathBuf,
    pub manifest_path: PathBuf,
    pub dry_run: bool,
    pub render_timeout: Duration,
    pub clock_skew_seconds: i64,
    pub credentials: Credentials,
}

/// Loads a static YAML config file and injects the credentials from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let credentials = credentials_from_env()?;
    let config = validate(raw, credentials).map_err(|e| {
        error!(error = %e, config_path = ?path_ref, "Invalid configuration");
        e
    })?;
    info!(
        instance = %config.instance_url,
        org_unit_id = config.org_unit_id,
        dry_run = config.dry_run,
        "Configuration loaded"
    );
    Ok(config)
}

fn credentials_from_env() -> Result<Credentials> {
    let read = |name: &str| -> Result<String> {
        env::var(name).map_err(|_| {
            error!(variable = name, "Missing credential in environment");
            anyhow!("{name} must be set")
        })
    };
    Ok(Credentials {
        app_id: read(APP_ID_VAR)?,
        app_key: read(APP_KEY_VAR)?,
        user_id: read(USER_ID_VAR)?,
        user_key: read(USER_KEY_VAR)?,
    })
}

pub fn validate(raw: RawConfig, credentials: Credentials) -> Result<CliConfig> {
    for (name, value) in [
        (APP_ID_VAR, &credentials.app_id),
        (APP_KEY_VAR, &credentials.app_key),
        (USER_ID_VAR, &credentials.user_id),
        (USER_KEY_VAR, &credentials.user_key),
    ] {
        if value.is_empty() || value.chars().count() > MAX_CREDENTIAL_LEN {
            bail!("{name} must be between 1 and {MAX_CREDENTIAL_LEN} characters");
        }
    }

    let manifest = raw.manifest_path.to_string_lossy();
    if manifest.is_empty() || manifest.chars().count() > MAX_PATH_LEN {
        bail!("manifest_path must be between 1 and {MAX_PATH_LEN} characters");
    }
    if !manifest.ends_with(".json") {
        bail!("manifest_path must point to a .json file, got '{manifest}'");
    }

    let content = raw.content_directory.to_string_lossy();
    if content.is_empty() || content.chars().count() > MAX_PATH_LEN {
        bail!("content_directory must be between 1 and {MAX_PATH_LEN} characters");
    }

    let instance_url = instance_url(&raw.instance_domain)?;

    Ok(CliConfig {
        instance_url,
        org_unit_id: raw.org_unit_id,
        content_directory: raw.content_directory,
        manifest_path: raw.manifest_path,
        dry_run: raw.dry_run,
        render_timeout: Duration::from_millis(raw.render_timeout_ms),
        clock_skew_seconds: raw.clock_skew_seconds,
        credentials,
    })
}

/// `https://<domain>`, rejecting anything that does not parse to a URL with a host.
pub fn instance_url(domain: &str) -> Result<Url> {
    let domain = domain.trim();
    if domain.is_empty() || domain.contains("://") || domain.contains('/') {
        bail!("instance_domain must be a bare domain name, got '{domain}'");
    }
    let url = Url::parse(&format!("https://{domain}"))
        .map_err(|e| anyhow!("instance_domain '{domain}' is not a valid domain: {e}"))?;
    if url.host_str().map_or(true, str::is_empty) {
        bail!("instance_domain '{domain}' has no host");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_bare_domain() {
        let url = instance_url("school.brightspace.com").unwrap();
        assert_eq!(url.as_str(), "https://school.brightspace.com/");
    }

    #[test]
    fn rejects_urls_and_garbage() {
        assert!(instance_url("https://school.brightspace.com").is_err());
        assert!(instance_url("school.brightspace.com/d2l").is_err());
        assert!(instance_url("").is_err());
        assert!(instance_url("bad domain").is_err());
    }
}
