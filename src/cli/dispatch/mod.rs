use crate::cli::actions::Action;
use crate::config::{split_prefix_list, Config, CorsConfig, Features, RoutePolicy, TotpConfig};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Turn parsed arguments into a validated [`Config`] and the action to run.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let signing_key = matches
        .get_one::<String>("signing-key")
        .map(|key| SecretString::from(key.to_string()))
        .context("missing required argument: --signing-key")?;

    let allow = matches
        .get_one::<String>("allow-prefixes")
        .map_or_else(Vec::new, |raw| split_prefix_list(raw));
    let deny = matches
        .get_one::<String>("deny-prefixes")
        .map_or_else(Vec::new, |raw| split_prefix_list(raw));
    let route_policy = RoutePolicy::from_lists(allow, deny)?;

    let totp = if matches.get_flag("totp-enable") {
        let issuer = matches
            .get_one::<String>("totp-issuer")
            .map(String::to_string)
            .unwrap_or_else(|| "authgate".to_string());
        let key = matches
            .get_one::<String>("totp-encrypt-key")
            .map(|key| SecretString::from(key.to_string()))
            .context("--totp-encrypt-key is required when --totp-enable is set")?;
        Some(TotpConfig::new(issuer, key)?)
    } else {
        None
    };

    let features = Features {
        signup: !matches.get_flag("disable-signup"),
        change_password: !matches.get_flag("disable-change-password"),
        change_email: !matches.get_flag("disable-change-email"),
        forgot_password: !matches.get_flag("disable-forgot-password"),
        delete_account: !matches.get_flag("disable-delete-account"),
    };

    let cors = CorsConfig {
        enabled: matches.get_flag("cors-enable"),
        origin: matches
            .get_one::<String>("cors-origin")
            .map_or_else(|| "*".to_string(), String::to_string),
        headers: matches
            .get_one::<String>("cors-headers")
            .map_or_else(|| "*".to_string(), String::to_string),
    };

    let config = Config::new(
        matches.get_one::<u16>("port").copied().unwrap_or(8080),
        matches
            .get_one::<String>("api-path")
            .map_or_else(|| "/auth/".to_string(), String::to_string),
        matches
            .get_one::<String>("upstream")
            .map(String::as_str)
            .unwrap_or("http://127.0.0.1:80"),
        signing_key,
        route_policy,
        matches
            .get_one::<i64>("access-token-lifetime")
            .copied()
            .unwrap_or(5),
        matches
            .get_one::<i64>("refresh-token-lifetime")
            .copied()
            .unwrap_or(1440),
        matches
            .get_one::<i64>("pending-action-lifetime")
            .copied()
            .unwrap_or(1440),
        totp,
        features,
        cors,
    )?;

    Ok(Action::Server {
        config: Box::new(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_handler_defaults() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
        ]);
        let Action::Server { config } = handler(&matches).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_path, "/auth/");
        assert_eq!(config.access_token_lifetime_minutes, 5);
        assert!(config.totp.is_none());
        assert!(matches!(config.route_policy, RoutePolicy::GuardAll));
        assert!(config.features.signup);
    }

    #[test]
    fn test_handler_mutually_exclusive_prefix_lists() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
            "--allow-prefixes",
            "/public/",
            "--deny-prefixes",
            "/admin/",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn test_handler_totp_requires_key() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
            "--totp-enable",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn test_handler_totp_short_key() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
            "--totp-enable",
            "--totp-encrypt-key",
            "too-short",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn test_handler_totp_enabled() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
            "--totp-enable",
            "--totp-encrypt-key",
            "0123456789abcdef",
            "--totp-issuer",
            "example",
        ]);
        let Action::Server { config } = handler(&matches).unwrap();
        let totp = config.totp.unwrap();
        assert_eq!(totp.issuer, "example");
    }

    #[test]
    fn test_handler_disable_flags() {
        let matches = commands::new().get_matches_from(vec![
            "authgate",
            "--signing-key",
            "super-secret-signing-key",
            "--disable-signup",
            "--disable-delete-account",
        ]);
        let Action::Server { config } = handler(&matches).unwrap();
        assert!(!config.features.signup);
        assert!(!config.features.delete_account);
        assert!(config.features.change_password);
    }
}
