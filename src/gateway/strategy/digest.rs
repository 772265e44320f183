//! HTTP Digest challenge-response strategy (RFC 2617, MD5 and MD5-sess).
//!
//! The expected response is always computed from the secret held by the
//! credential store; the client only proves knowledge of it. Nonces are not
//! tracked, so any nonce issued by a challenge is accepted.

use regex::Regex;
use std::{collections::HashMap, sync::OnceLock};
use ulid::Ulid;

use super::{RejectReason, Verdict, VerifyContext};
use crate::gateway::error::AuthError;

/// Parsed parameters of an `Authorization: Digest` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestClaim {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Option<String>,
    pub qop: Option<String>,
    pub nc: Option<String>,
    pub cnonce: Option<String>,
    pub opaque: Option<String>,
}

static PARAM_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn param_re() -> Option<&'static Regex> {
    PARAM_RE
        .get_or_init(|| Regex::new(r#"([A-Za-z][\w-]*)\s*=\s*(?:"([^"]*)"|([^\s,]*))"#).ok())
        .as_ref()
}

pub(crate) fn parse(params: &str) -> Option<DigestClaim> {
    let re = param_re()?;
    let mut fields: HashMap<String, String> = HashMap::new();
    for capture in re.captures_iter(params) {
        let key = capture.get(1)?.as_str().to_ascii_lowercase();
        let value = capture
            .get(2)
            .or_else(|| capture.get(3))
            .map_or("", |m| m.as_str());
        fields.entry(key).or_insert_with(|| value.to_string());
    }

    let mut take = |key: &str| fields.remove(key);
    let claim = DigestClaim {
        username: take("username").filter(|u| !u.is_empty())?,
        realm: take("realm")?,
        nonce: take("nonce")?,
        uri: take("uri")?,
        response: take("response")?.to_ascii_lowercase(),
        algorithm: take("algorithm"),
        qop: take("qop"),
        nc: take("nc"),
        cnonce: take("cnonce"),
        opaque: take("opaque"),
    };
    // RFC 2617: nc and cnonce are required whenever qop is sent.
    if claim.qop.is_some() && (claim.nc.is_none() || claim.cnonce.is_none()) {
        return None;
    }
    Some(claim)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Compute the response a client holding `secret` should have sent.
///
/// Returns `None` for algorithms or qop values this strategy does not speak.
#[must_use]
pub fn expected_response(claim: &DigestClaim, secret: &str, method: &str) -> Option<String> {
    let base = md5_hex(&format!("{}:{}:{secret}", claim.username, claim.realm));
    let ha1 = match claim.algorithm.as_deref() {
        None => base,
        Some(alg) if alg.eq_ignore_ascii_case("md5") => base,
        Some(alg) if alg.eq_ignore_ascii_case("md5-sess") => md5_hex(&format!(
            "{base}:{}:{}",
            claim.nonce,
            claim.cnonce.as_deref().unwrap_or_default()
        )),
        Some(_) => return None,
    };
    let ha2 = md5_hex(&format!("{method}:{}", claim.uri));
    match claim.qop.as_deref() {
        None => Some(md5_hex(&format!("{ha1}:{}:{ha2}", claim.nonce))),
        Some("auth") => Some(md5_hex(&format!(
            "{ha1}:{}:{}:{}:auth:{ha2}",
            claim.nonce,
            claim.nc.as_deref().unwrap_or_default(),
            claim.cnonce.as_deref().unwrap_or_default(),
        ))),
        Some(_) => None,
    }
}

pub(crate) async fn verify(
    ctx: &VerifyContext<'_>,
    claim: &DigestClaim,
) -> Result<Verdict, AuthError> {
    let Some(principal) = ctx.store.find_by_username(&claim.username).await? else {
        return Ok(Verdict::Rejected(RejectReason::UnknownUser));
    };
    if claim.realm != ctx.realm {
        return Ok(Verdict::Rejected(RejectReason::RealmMismatch));
    }
    if claim.uri != ctx.uri {
        return Ok(Verdict::Rejected(RejectReason::UriMismatch));
    }
    if claim.opaque.as_deref().is_some_and(|opaque| opaque != ctx.opaque) {
        return Ok(Verdict::Rejected(RejectReason::OpaqueMismatch));
    }
    let Some(secret) = ctx.scheme.digest_key(&principal.secret) else {
        return Ok(Verdict::Rejected(RejectReason::SchemeUnsupported));
    };
    match expected_response(claim, secret, ctx.method) {
        Some(expected) if expected == claim.response => Ok(Verdict::Authenticated(principal)),
        _ => Ok(Verdict::Rejected(RejectReason::DigestMismatch)),
    }
}

/// `WWW-Authenticate` value with a fresh nonce.
#[must_use]
pub fn challenge(realm: &str, opaque: &str) -> String {
    let nonce = Ulid::new().to_string().to_ascii_lowercase();
    format!("Digest realm=\"{realm}\", qop=\"auth\", nonce=\"{nonce}\", opaque=\"{opaque}\", algorithm=MD5")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, store};
    use super::*;
    use crate::gateway::{principal::Principal, secret::SecretScheme, store::MemoryStore};

    fn signed_claim(username: &str, secret: &str, method: &str, uri: &str) -> DigestClaim {
        let mut claim = DigestClaim {
            username: username.to_string(),
            realm: "fieldgate".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            uri: uri.to_string(),
            response: String::new(),
            algorithm: Some("MD5".to_string()),
            qop: Some("auth".to_string()),
            nc: Some("00000001".to_string()),
            cnonce: Some("0a4f113b".to_string()),
            opaque: Some("opaque-value".to_string()),
        };
        claim.response = expected_response(&claim, secret, method).unwrap_or_default();
        claim
    }

    #[test]
    fn matches_rfc2617_example() {
        // Worked example from RFC 2617 section 3.5.
        let claim = DigestClaim {
            username: "Mufasa".to_string(),
            realm: "testrealm@host.com".to_string(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string(),
            uri: "/dir/index.html".to_string(),
            response: String::new(),
            algorithm: None,
            qop: Some("auth".to_string()),
            nc: Some("00000001".to_string()),
            cnonce: Some("0a4f113b".to_string()),
            opaque: None,
        };
        assert_eq!(
            expected_response(&claim, "Circle Of Life", "GET").as_deref(),
            Some("6629fae49393a05397450978507c4ef1")
        );
    }

    #[test]
    fn parses_header_parameters() {
        let claim = parse(
            r#"username="Mufasa", realm="testrealm@host.com", nonce="abc", uri="/dir/index.html", qop=auth, nc=00000001, cnonce="0a4f113b", response="6629FAE49393A05397450978507C4EF1", opaque="xyz""#,
        );
        let claim = claim.unwrap_or_default();
        assert_eq!(claim.username, "Mufasa");
        assert_eq!(claim.qop.as_deref(), Some("auth"));
        assert_eq!(claim.nc.as_deref(), Some("00000001"));
        assert_eq!(claim.response, "6629fae49393a05397450978507c4ef1");
        assert_eq!(claim.opaque.as_deref(), Some("xyz"));
    }

    #[test]
    fn parameter_pattern_is_compiled_once() {
        let first = param_re().map(std::ptr::from_ref);
        assert!(first.is_some());
        assert_eq!(first, param_re().map(std::ptr::from_ref));
    }

    #[test]
    fn parse_requires_core_fields() {
        assert!(parse(r#"realm="r", nonce="n", uri="/", response="x""#).is_none());
        assert!(parse(r#"username="u", realm="r", nonce="n", uri="/", response="x", qop=auth"#).is_none());
    }

    #[test]
    fn unsupported_qop_has_no_expected_response() {
        let mut claim = signed_claim("alice", "correct", "GET", "/");
        claim.qop = Some("auth-int".to_string());
        assert!(expected_response(&claim, "correct", "GET").is_none());
    }

    #[tokio::test]
    async fn authenticates_with_stored_secret() -> anyhow::Result<()> {
        let store = store();
        let ctx = context(&store, "GET", "/omk/odk/submissions");
        let claim = signed_claim("alice", "correct", "GET", "/omk/odk/submissions");
        let verdict = verify(&ctx, &claim).await?;
        assert!(matches!(verdict, Verdict::Authenticated(ref p) if p.username == "alice"));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_wrong_secret_and_mismatched_request() -> anyhow::Result<()> {
        let store = store();
        let ctx = context(&store, "GET", "/omk/odk/submissions");

        let claim = signed_claim("alice", "guess", "GET", "/omk/odk/submissions");
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::DigestMismatch)
        );

        let claim = signed_claim("alice", "correct", "POST", "/omk/odk/submissions");
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::DigestMismatch)
        );

        let claim = signed_claim("alice", "correct", "GET", "/elsewhere");
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::UriMismatch)
        );

        let mut claim = signed_claim("alice", "correct", "GET", "/omk/odk/submissions");
        claim.realm = "other".to_string();
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::RealmMismatch)
        );

        let claim = signed_claim("mallory", "correct", "GET", "/omk/odk/submissions");
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::UnknownUser)
        );
        Ok(())
    }

    #[tokio::test]
    async fn hashed_store_cannot_answer_digest() -> anyhow::Result<()> {
        let hashed = crate::gateway::secret::hash_secret("correct")?;
        let store = MemoryStore::new(vec![Principal::new("1", "alice", hashed, None)])?;
        let mut ctx = context(&store, "GET", "/x");
        ctx.scheme = SecretScheme::Argon2;
        let claim = signed_claim("alice", "correct", "GET", "/x");
        assert_eq!(
            verify(&ctx, &claim).await?,
            Verdict::Rejected(RejectReason::SchemeUnsupported)
        );
        Ok(())
    }

    #[test]
    fn challenge_carries_fresh_nonce() {
        let first = challenge("fieldgate", "op");
        let second = challenge("fieldgate", "op");
        assert!(first.starts_with("Digest realm=\"fieldgate\", qop=\"auth\", nonce=\""));
        assert!(first.contains("opaque=\"op\""));
        assert_ne!(first, second);
    }
}
