// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-repository token/secret resolution (spec.md §4.2).
//!
//! Generalised from `shipper_auth::resolve_token`'s config-then-environment
//! precedence and `TokenSource` distinction, extended here to also resolve
//! webhook secrets and to key by repository full name rather than registry
//! name.

use octorunner_config::RunnerConfig;

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Found in the loaded configuration file.
    Config,
    /// Found in the `OCTORUNNER_<FULL_NAME>_{TOKEN,SECRET}` environment overlay.
    Environment,
}

/// Polymorphic credential lookup (spec.md §9): the reference Go source
/// exposes a two-method interface (`lookup_token`/`lookup_secret`) with one
/// implementation, preserved here so a richer provider (a rotating-token or
/// HashiCorp-Vault-style fetch) can stand in for [`CredentialStore`] without
/// its callers changing.
pub trait CredentialProvider: Send + Sync {
    /// Resolve the token for `full_name`, authorising archive download and
    /// status posting.
    fn lookup_token(&self, full_name: &str) -> Option<(String, CredentialSource)>;
    /// Resolve the webhook secret for `full_name`, authorising the
    /// signature check.
    fn lookup_secret(&self, full_name: &str) -> Option<(String, CredentialSource)>;
}

/// Resolves `{token, secret}` for a repository by full name
/// (`owner/repo`), config first, environment overlay on miss.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    config: RunnerConfig,
}

impl CredentialStore {
    /// Wrap a loaded [`RunnerConfig`].
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Resolve the token for `full_name`, authorising archive download and
    /// status posting.
    #[must_use]
    pub fn token(&self, full_name: &str) -> Option<(String, CredentialSource)> {
        if let Some(token) = self
            .config
            .repositories
            .get(full_name)
            .and_then(|c| c.token.clone())
        {
            return Some((token, CredentialSource::Config));
        }
        std::env::var(env_var_name(full_name, "TOKEN"))
            .ok()
            .map(|v| (v, CredentialSource::Environment))
    }

    /// Resolve the webhook secret for `full_name`, authorising the
    /// signature check.
    #[must_use]
    pub fn secret(&self, full_name: &str) -> Option<(String, CredentialSource)> {
        if let Some(secret) = self
            .config
            .repositories
            .get(full_name)
            .and_then(|c| c.secret.clone())
        {
            return Some((secret, CredentialSource::Config));
        }
        std::env::var(env_var_name(full_name, "SECRET"))
            .ok()
            .map(|v| (v, CredentialSource::Environment))
    }
}

impl CredentialProvider for CredentialStore {
    fn lookup_token(&self, full_name: &str) -> Option<(String, CredentialSource)> {
        self.token(full_name)
    }

    fn lookup_secret(&self, full_name: &str) -> Option<(String, CredentialSource)> {
        self.secret(full_name)
    }
}

/// `OCTORUNNER_<FULL_NAME>_<SUFFIX>`, with `full_name`'s `/` and `-`
/// mapped to `_` and upper-cased, matching spec.md §6's "dots in option
/// names map to underscores" environment-overlay convention extended to
/// repository full names.
fn env_var_name(full_name: &str, suffix: &str) -> String {
    let normalized: String = full_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "{}_{}_{}",
        octorunner_config::ENV_PREFIX,
        normalized.to_uppercase(),
        suffix
    )
}
