use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SIGNING_KEY: &str = "token-signing-key";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ACCESS_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_RESET_TTL: &str = "reset-token-ttl-seconds";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SIGNING_KEY)
                .long(ARG_TOKEN_SIGNING_KEY)
                .help("HMAC key used to sign access and refresh tokens")
                .env("BILETO_TOKEN_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for CORS and cookie policy")
                .env("BILETO_FRONTEND_BASE_URL")
                .default_value("https://bileto.dev"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL)
                .long(ARG_ACCESS_TTL)
                .help("Access token TTL in seconds")
                .env("BILETO_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL)
                .long(ARG_REFRESH_TTL)
                .help("Refresh token TTL in seconds")
                .env("BILETO_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RESET_TTL)
                .long(ARG_RESET_TTL)
                .help("Password-reset token TTL in seconds")
                .env("BILETO_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub signing_key: String,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            signing_key: matches
                .get_one::<String>(ARG_TOKEN_SIGNING_KEY)
                .cloned()
                .context("missing required argument: --token-signing-key")?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TTL)
                .copied()
                .context("missing required argument: --access-token-ttl-seconds")?,
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TTL)
                .copied()
                .context("missing required argument: --refresh-token-ttl-seconds")?,
            reset_token_ttl_seconds: matches
                .get_one::<i64>(ARG_RESET_TTL)
                .copied()
                .context("missing required argument: --reset-token-ttl-seconds")?,
        })
    }
}
