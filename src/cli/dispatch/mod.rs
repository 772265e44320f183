use crate::{
    cli::actions::{hash, server, Action},
    gateway::{GatewayConfig, SecretScheme, Zone},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub_m) = matches.subcommand_matches("hash-secret") {
        let secret = sub_m
            .get_one::<String>("secret")
            .cloned()
            .context("missing required argument: SECRET")?;
        return Ok(Action::HashSecret(hash::Args {
            secret: SecretString::from(secret),
        }));
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();
    let users_file = matches.get_one::<String>("users-file").map(PathBuf::from);
    if dsn.is_none() && users_file.is_none() {
        anyhow::bail!("missing required argument: --dsn or --users-file");
    }

    let mut config = GatewayConfig::new()
        .with_session_cookie_secure(matches.get_flag("cookie-secure"))
        .with_secret_scheme(
            matches
                .get_one::<SecretScheme>("secret-scheme")
                .copied()
                .unwrap_or_default(),
        );
    if let Some(realm) = matches.get_one::<String>("realm") {
        config = config.with_realm(realm.clone());
    }
    if let Some(ttl) = matches.get_one::<u64>("session-ttl") {
        config = config.with_session_ttl_seconds(*ttl);
    }
    if let Some(seconds) = matches.get_one::<u64>("store-timeout") {
        config = config.with_store_timeout(Duration::from_secs(*seconds));
    }

    let zones = matches
        .get_many::<Zone>("zone")
        .map(|zones| zones.cloned().collect::<Vec<_>>());

    Ok(Action::Server(server::Args {
        port,
        dsn,
        users_file,
        upstream: matches.get_one::<String>("upstream").cloned(),
        config,
        zones,
    }))
}
