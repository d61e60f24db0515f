use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("authgate")
        .about("Authenticating reverse proxy")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTHGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("api-path")
                .long("api-path")
                .help("Base path for the authentication endpoints")
                .default_value("/auth/")
                .env("AUTHGATE_API_PATH"),
        )
        .arg(
            Arg::new("upstream")
                .short('u')
                .long("upstream")
                .help("Upstream URL permitted requests are forwarded to")
                .default_value("http://127.0.0.1:80")
                .env("AUTHGATE_UPSTREAM"),
        )
        .arg(
            Arg::new("signing-key")
                .short('k')
                .long("signing-key")
                .help("HMAC key used to sign and verify access tokens")
                .env("AUTHGATE_SIGNING_KEY")
                .required(true),
        )
        .arg(
            Arg::new("allow-prefixes")
                .long("allow-prefixes")
                .help("Colon-separated path prefixes forwarded without a token; everything else is guarded")
                .env("AUTHGATE_ALLOW_PREFIXES"),
        )
        .arg(
            Arg::new("deny-prefixes")
                .long("deny-prefixes")
                .help("Colon-separated path prefixes that require a token; everything else is open")
                .env("AUTHGATE_DENY_PREFIXES"),
        )
        .arg(
            Arg::new("access-token-lifetime")
                .long("access-token-lifetime")
                .help("Access token lifetime in minutes")
                .default_value("5")
                .env("AUTHGATE_ACCESS_TOKEN_LIFETIME")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-lifetime")
                .long("refresh-token-lifetime")
                .help("Refresh token lifetime in minutes")
                .default_value("1440")
                .env("AUTHGATE_REFRESH_TOKEN_LIFETIME")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("pending-action-lifetime")
                .long("pending-action-lifetime")
                .help("Pending action (confirm token) lifetime in minutes")
                .default_value("1440")
                .env("AUTHGATE_PENDING_ACTION_LIFETIME")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("totp-enable")
                .long("totp-enable")
                .help("Enable the TOTP second factor endpoints")
                .env("AUTHGATE_TOTP_ENABLE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("totp-issuer")
                .long("totp-issuer")
                .help("Issuer shown in authenticator apps")
                .default_value("authgate")
                .env("AUTHGATE_TOTP_ISSUER"),
        )
        .arg(
            Arg::new("totp-encrypt-key")
                .long("totp-encrypt-key")
                .help("Key used to encrypt TOTP secrets at rest, at least 16 bytes")
                .env("AUTHGATE_TOTP_ENCRYPT_KEY"),
        )
        .arg(
            Arg::new("disable-signup")
                .long("disable-signup")
                .help("Disable the signup endpoint")
                .env("AUTHGATE_DISABLE_SIGNUP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-change-password")
                .long("disable-change-password")
                .help("Disable the change password endpoint")
                .env("AUTHGATE_DISABLE_CHANGE_PASSWORD")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-change-email")
                .long("disable-change-email")
                .help("Disable the change email endpoint")
                .env("AUTHGATE_DISABLE_CHANGE_EMAIL")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-forgot-password")
                .long("disable-forgot-password")
                .help("Disable the password reset endpoint")
                .env("AUTHGATE_DISABLE_FORGOT_PASSWORD")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-delete-account")
                .long("disable-delete-account")
                .help("Disable the account deletion endpoint")
                .env("AUTHGATE_DISABLE_DELETE_ACCOUNT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cors-enable")
                .long("cors-enable")
                .help("Enable CORS headers on the authentication endpoints")
                .env("AUTHGATE_CORS_ENABLE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cors-origin")
                .long("cors-origin")
                .help("Allowed CORS origin, or * for any")
                .default_value("*")
                .env("AUTHGATE_CORS_ORIGIN"),
        )
        .arg(
            Arg::new("cors-headers")
                .long("cors-headers")
                .help("Comma-separated allowed CORS request headers, or * for any")
                .default_value("*")
                .env("AUTHGATE_CORS_HEADERS"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("AUTHGATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
