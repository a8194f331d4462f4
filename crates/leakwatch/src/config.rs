//! CLI configuration -- thin wrapper around `leakwatch_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --ws-url, --insecure, ...).

use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use clap::ValueEnum;
use clap::parser::ValueSource;
use url::Url;

use leakwatch_api::{ApiClient, ListenerConfig, TlsMode, TransportConfig};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use leakwatch_config::{
    Config, Defaults, FileSessionStore, Profile, config_path, derive_ws_url,
    load_config_or_default, resolve_password, save_config, store_password,
};

/// Everything a backend-bound command needs, with flags applied.
#[derive(Debug)]
pub struct Target {
    pub profile_name: String,
    pub api_url: Url,
    pub ws_url: Url,
    pub email: Option<String>,
    pub profile: Option<Profile>,
    pub transport: TransportConfig,
    pub listener: ListenerConfig,
}

impl Target {
    /// Client bound to this profile's session file.
    pub fn client(&self) -> Result<ApiClient, CliError> {
        let store = Arc::new(FileSessionStore::for_profile(&self.profile_name));
        Ok(ApiClient::new(self.api_url.clone(), store, &self.transport)?)
    }
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Resolve the target backend from the config file, profile, and flags.
///
/// Flags win over profile values. Without a profile, `--api-url` alone is
/// enough.
pub fn resolve_target(global: &GlobalOpts, cfg: &Config) -> Result<Target, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let profile = cfg.profiles.get(&profile_name).cloned();

    if profile.is_none() && global.api_url.is_none() {
        if global.profile.is_some() {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(cfg),
            });
        }
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let base = profile.clone().unwrap_or_default();

    let api_url = match global.api_url.as_deref() {
        Some(raw) => parse_url("api-url", raw)?,
        None => base.api_url()?,
    };

    let ws_url = match (global.ws_url.as_deref(), base.ws_url.as_deref()) {
        (Some(raw), _) => parse_url("ws-url", raw)?,
        (None, Some(raw)) => parse_url("ws_url", raw)?,
        (None, None) => derive_ws_url(&api_url)?,
    };

    let mut transport = base.transport_config(&cfg.defaults);
    if global.insecure {
        transport = transport.with_tls(TlsMode::DangerAcceptInvalid);
    }
    if let Some(secs) = global.timeout {
        transport = transport.with_timeout(Duration::from_secs(secs));
    }

    Ok(Target {
        email: base.email.clone(),
        listener: base.listener_config(&cfg.defaults),
        profile_name,
        api_url,
        ws_url,
        profile,
        transport,
    })
}

/// Take `--output` and `--color` from the config's `[defaults]` when neither
/// a flag nor an env var set them.
pub fn apply_config_defaults(global: &mut GlobalOpts, matches: &ArgMatches, defaults: &Defaults) {
    if left_at_default(matches, "output") {
        match <OutputFormat as ValueEnum>::from_str(&defaults.output, true) {
            Ok(format) => global.output = format,
            Err(_) => {
                tracing::warn!(value = %defaults.output, "ignoring unknown default output format");
            }
        }
    }
    if left_at_default(matches, "color") {
        match <ColorMode as ValueEnum>::from_str(&defaults.color, true) {
            Ok(mode) => global.color = mode,
            Err(_) => {
                tracing::warn!(value = %defaults.color, "ignoring unknown default color mode");
            }
        }
    }
}

fn left_at_default(matches: &ArgMatches, id: &str) -> bool {
    matches!(matches.value_source(id), None | Some(ValueSource::DefaultValue))
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, CliError> {
    raw.parse().map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}
