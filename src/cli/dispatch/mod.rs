//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: SecretString::from(auth_opts.signing_key),
        frontend_base_url: auth_opts.frontend_base_url,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn dispatch_builds_server_args() {
        temp_env::with_vars(
            [
                ("BILETO_PORT", None::<&str>),
                ("BILETO_ACCESS_TOKEN_TTL_SECONDS", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "bileto",
                    "--dsn",
                    "postgres://user@localhost:5432/bileto",
                    "--token-signing-key",
                    "dispatch-key",
                    "--access-token-ttl-seconds",
                    "120",
                ]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/bileto");
                assert_eq!(args.signing_key.expose_secret(), "dispatch-key");
                assert_eq!(args.access_ttl_seconds, 120);
                assert_eq!(args.refresh_ttl_seconds, 604_800);
            },
        );
    }
}
