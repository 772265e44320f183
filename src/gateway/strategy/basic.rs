//! HTTP Basic shared-secret strategy.

use base64ct::{Base64, Encoding};

use super::{verify_password_claim, PasswordClaim, Verdict, VerifyContext};
use crate::gateway::error::AuthError;

/// Decode the token following `Basic ` into a username/secret pair.
pub(crate) fn parse(token: &str) -> Option<PasswordClaim> {
    let decoded = Base64::decode_vec(token.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(PasswordClaim::new(username, password))
}

pub(crate) async fn verify(
    ctx: &VerifyContext<'_>,
    claim: &PasswordClaim,
) -> Result<Verdict, AuthError> {
    verify_password_claim(ctx, claim).await
}

/// `WWW-Authenticate` value inviting Basic credentials.
#[must_use]
pub fn challenge(realm: &str) -> String {
    format!("Basic realm=\"{realm}\"")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, store};
    use super::super::RejectReason;
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn parse_splits_on_first_colon() {
        let token = Base64::encode_string(b"alice:pa:ss");
        let claim = parse(&token);
        assert_eq!(claim.as_ref().map(|c| c.username.as_str()), Some("alice"));
        assert_eq!(
            claim.as_ref().map(|c| c.password.expose_secret().to_string()),
            Some("pa:ss".to_string())
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("%%%").is_none());
        assert!(parse(&Base64::encode_string(b"no-colon")).is_none());
        assert!(parse(&Base64::encode_string(b":secret")).is_none());
    }

    #[tokio::test]
    async fn verifies_against_store() -> anyhow::Result<()> {
        let store = store();
        let ctx = context(&store, "GET", "/omk/odk/forms");

        let verdict = verify(&ctx, &PasswordClaim::new("dave", "viewer-pw")).await?;
        assert!(matches!(verdict, Verdict::Authenticated(ref p) if p.id == "2"));

        let verdict = verify(&ctx, &PasswordClaim::new("dave", "viewer-pw2")).await?;
        assert_eq!(verdict, Verdict::Rejected(RejectReason::SecretMismatch));
        Ok(())
    }

    #[test]
    fn challenge_names_realm() {
        assert_eq!(challenge("omk"), "Basic realm=\"omk\"");
    }
}
