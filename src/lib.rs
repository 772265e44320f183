//! # fieldgate
//!
//! Access-control gateway for field data collection servers (OpenRosa / ODK
//! clients and the pages that aggregate their submissions).
//!
//! Every request is classified into a zone. Public zones pass straight
//! through. Protected zones resume the caller's session or authenticate it
//! with, in order, a posted login form, HTTP Basic or HTTP Digest; the first
//! success establishes a new session. Role zones additionally require the
//! principal's role to be in the zone's set.
//!
//! Users come from a `PostgreSQL` table or a JSON users file behind the
//! [`gateway::CredentialStore`] trait; sessions live in an in-process store
//! with a fixed time-to-live.

pub mod api;
pub mod cli;
pub mod gateway;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_commit_hash_is_hex_or_unknown() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn app_user_agent_names_the_crate() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
