use crate::{
    api::{self, handlers::Upstream},
    gateway::{
        CredentialStore, Gateway, GatewayConfig, MemorySessionStore, MemoryStore, PgStore, Zone,
        ZoneTable,
    },
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub users_file: Option<PathBuf>,
    pub upstream: Option<String>,
    pub config: GatewayConfig,
    /// Replaces the default zone table when present.
    pub zones: Option<Vec<Zone>>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the credential store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = open_store(args.dsn.as_deref(), args.users_file.as_deref()).await?;
    let zones = args.zones.map_or_else(ZoneTable::default, ZoneTable::new);
    let sessions = Arc::new(MemorySessionStore::new(args.config.session_ttl()));
    let gateway = Arc::new(Gateway::new(args.config, store, sessions, zones));

    let upstream = args
        .upstream
        .as_deref()
        .map(Upstream::new)
        .transpose()?
        .map(Arc::new);

    api::new(args.port, gateway, upstream).await
}

async fn open_store(
    dsn: Option<&str>,
    users_file: Option<&std::path::Path>,
) -> Result<Arc<dyn CredentialStore>> {
    if let Some(dsn) = dsn {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        return Ok(Arc::new(PgStore::new(pool)));
    }

    let path = users_file.context("either --dsn or --users-file is required")?;
    let store = MemoryStore::from_file(path)?;
    info!("Loaded {} users from {}", store.len(), path.display());
    Ok(Arc::new(store))
}

fn log_startup_args(args: &Args) {
    let zones = args.zones.as_ref().map_or_else(
        || "default".to_string(),
        |zones| {
            zones
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";")
        },
    );
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none".to_string(), redact_dsn),
        ),
        (
            "users_file",
            args.users_file
                .as_ref()
                .map_or_else(|| "none".to_string(), |path| path.display().to_string()),
        ),
        (
            "upstream",
            args.upstream.clone().unwrap_or_else(|| "none".to_string()),
        ),
        ("realm", args.config.realm().to_string()),
        ("session_ttl", args.config.session_ttl_seconds().to_string()),
        (
            "cookie_secure",
            args.config.session_cookie_secure().to_string(),
        ),
        ("secret_scheme", args.config.secret_scheme().to_string()),
        (
            "store_timeout",
            format!("{}s", args.config.store_timeout().as_secs()),
        ),
        ("zones", zones),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_dsn_hides_password() {
        assert_eq!(
            redact_dsn("postgres://omk:hunter2@db:5432/omk"),
            "postgres://omk:REDACTED@db:5432/omk"
        );
        assert_eq!(redact_dsn("postgres://db/omk"), "postgres://db/omk");
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[tokio::test]
    async fn open_store_needs_a_source() {
        assert!(open_store(None, None).await.is_err());
    }

    #[tokio::test]
    async fn open_store_reads_users_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("fieldgate-users-{}.json", ulid::Ulid::new()));
        std::fs::write(
            &path,
            r#"[{"id": 1, "username": "alice", "password": "correct", "role": "admin"}]"#,
        )?;
        let store = open_store(None, Some(&path)).await;
        std::fs::remove_file(&path)?;
        let alice = store?.find_by_username("alice").await?;
        assert_eq!(alice.map(|p| p.id), Some("1".to_string()));
        Ok(())
    }
}
