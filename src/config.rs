//! Process configuration, built once at startup and shared by reference.

use anyhow::{bail, ensure, Context, Result};
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Identity header injected on authenticated forwards; any inbound value is
/// stripped before the request reaches the upstream.
pub const IDENTITY_HEADER: &str = "x-auth-userid";

/// Per-feature enable flags for the account lifecycle endpoints.
#[derive(Debug, Clone)]
pub struct Features {
    pub signup: bool,
    pub change_password: bool,
    pub change_email: bool,
    pub forgot_password: bool,
    pub delete_account: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            signup: true,
            change_password: true,
            change_email: true,
            forgot_password: true,
            delete_account: true,
        }
    }
}

/// Route policy for the proxy gate. The allow-list is a bypass (matching
/// paths are forwarded unauthenticated), the deny-list is a requirement
/// (matching paths need a valid token). With neither configured every path
/// is guarded.
#[derive(Debug, Clone, Default)]
pub enum RoutePolicy {
    #[default]
    GuardAll,
    AllowPrefixes(Vec<String>),
    DenyPrefixes(Vec<String>),
}

impl RoutePolicy {
    /// Build the policy from the two configured prefix lists. Configuring
    /// both is a fatal startup misconfiguration.
    ///
    /// # Errors
    /// Returns an error if both lists are non-empty.
    pub fn from_lists(allow: Vec<String>, deny: Vec<String>) -> Result<Self> {
        if !allow.is_empty() && !deny.is_empty() {
            bail!("allow and deny prefix lists are mutually exclusive");
        }
        if !allow.is_empty() {
            Ok(Self::AllowPrefixes(allow))
        } else if !deny.is_empty() {
            Ok(Self::DenyPrefixes(deny))
        } else {
            Ok(Self::GuardAll)
        }
    }

    /// Whether a request for `path` must carry a currently valid access token
    /// before it may be forwarded.
    #[must_use]
    pub fn requires_token(&self, path: &str) -> bool {
        match self {
            Self::GuardAll => true,
            Self::AllowPrefixes(prefixes) => {
                !prefixes.iter().any(|prefix| path.starts_with(prefix))
            }
            Self::DenyPrefixes(prefixes) => prefixes.iter().any(|prefix| path.starts_with(prefix)),
        }
    }
}

/// TOTP second-factor configuration. Present only when the feature is
/// enabled; the encryption key protects secrets at rest.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    pub issuer: String,
    pub encryption_key: SecretString,
}

impl TotpConfig {
    /// # Errors
    /// Returns an error if the encryption key is shorter than 16 bytes.
    pub fn new(issuer: String, encryption_key: SecretString) -> Result<Self> {
        ensure!(
            encryption_key.expose_secret().len() >= 16,
            "TOTP encryption key must be at least 16 bytes"
        );
        Ok(Self {
            issuer,
            encryption_key,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origin: String,
    pub headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: "*".to_string(),
            headers: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base path for the authentication endpoints, normalized with leading
    /// and trailing slash.
    pub api_path: String,
    /// Upstream the proxy gate forwards permitted requests to.
    pub upstream: Url,
    pub signing_key: SecretString,
    pub route_policy: RoutePolicy,
    pub access_token_lifetime_minutes: i64,
    pub refresh_token_lifetime_minutes: i64,
    pub pending_action_lifetime_minutes: i64,
    pub totp: Option<TotpConfig>,
    pub features: Features,
    pub cors: CorsConfig,
}

impl Config {
    /// Validate and normalize raw configuration values.
    ///
    /// # Errors
    /// Returns an error on an unparsable upstream URL, mutually exclusive
    /// prefix lists, a short TOTP encryption key, or non-positive lifetimes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        port: u16,
        api_path: String,
        upstream: &str,
        signing_key: SecretString,
        route_policy: RoutePolicy,
        access_token_lifetime_minutes: i64,
        refresh_token_lifetime_minutes: i64,
        pending_action_lifetime_minutes: i64,
        totp: Option<TotpConfig>,
        features: Features,
        cors: CorsConfig,
    ) -> Result<Self> {
        let upstream = Url::parse(upstream).context("invalid upstream URL")?;
        ensure!(
            access_token_lifetime_minutes > 0
                && refresh_token_lifetime_minutes > 0
                && pending_action_lifetime_minutes > 0,
            "token lifetimes must be positive"
        );
        ensure!(
            !signing_key.expose_secret().is_empty(),
            "signing key must not be empty"
        );
        Ok(Self {
            port,
            api_path: normalize_api_path(&api_path),
            upstream,
            signing_key,
            route_policy,
            access_token_lifetime_minutes,
            refresh_token_lifetime_minutes,
            pending_action_lifetime_minutes,
            totp,
            features,
            cors,
        })
    }

    #[must_use]
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::minutes(self.access_token_lifetime_minutes)
    }

    #[must_use]
    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::minutes(self.refresh_token_lifetime_minutes)
    }

    #[must_use]
    pub fn pending_action_lifetime(&self) -> Duration {
        Duration::minutes(self.pending_action_lifetime_minutes)
    }
}

fn normalize_api_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Split a colon-separated prefix list as configured in the environment.
#[must_use]
pub fn split_prefix_list(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_lists_fatal() {
        let result = RoutePolicy::from_lists(
            vec!["/public".to_string()],
            vec!["/private".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_allow_list_is_bypass() {
        let policy =
            RoutePolicy::from_lists(vec!["/public/".to_string()], Vec::new()).unwrap();
        assert!(!policy.requires_token("/public/index.html"));
        assert!(policy.requires_token("/api/orders"));
    }

    #[test]
    fn test_deny_list_guards_only_matches() {
        let policy = RoutePolicy::from_lists(Vec::new(), vec!["/admin".to_string()]).unwrap();
        assert!(policy.requires_token("/admin/users"));
        assert!(!policy.requires_token("/landing"));
    }

    #[test]
    fn test_default_guards_everything() {
        let policy = RoutePolicy::from_lists(Vec::new(), Vec::new()).unwrap();
        assert!(policy.requires_token("/anything"));
    }

    #[test]
    fn test_totp_key_minimum_length() {
        assert!(TotpConfig::new(
            "Authgate".to_string(),
            SecretString::from("too-short".to_string())
        )
        .is_err());
        assert!(TotpConfig::new(
            "Authgate".to_string(),
            SecretString::from("0123456789abcdef".to_string())
        )
        .is_ok());
    }

    #[test]
    fn test_api_path_normalized() {
        assert_eq!(normalize_api_path("auth"), "/auth/");
        assert_eq!(normalize_api_path("/auth"), "/auth/");
        assert_eq!(normalize_api_path("/auth/"), "/auth/");
    }

    #[test]
    fn test_split_prefix_list() {
        assert_eq!(
            split_prefix_list("/a:/b/c"),
            vec!["/a".to_string(), "/b/c".to_string()]
        );
        assert!(split_prefix_list("").is_empty());
        assert!(split_prefix_list("  ").is_empty());
    }
}
