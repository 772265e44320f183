//! Direct-credential strategy for the first-party login form.
//!
//! Same matching rule as Basic; the claim comes from a JSON or urlencoded
//! request body with `username` and `password` fields.

use serde::Deserialize;

use super::{verify_password_claim, PasswordClaim, Verdict, VerifyContext};
use crate::gateway::error::AuthError;

#[derive(Deserialize)]
struct FormFields {
    username: Option<String>,
    password: Option<String>,
}

/// Whether a body with this content type may carry form credentials.
#[must_use]
pub fn accepts_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| {
        let media = value.split(';').next().unwrap_or_default().trim();
        media.eq_ignore_ascii_case("application/json")
            || media.eq_ignore_ascii_case("application/x-www-form-urlencoded")
    })
}

/// Extract a claim from a request body. Missing or empty fields yield `None`.
#[must_use]
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Option<PasswordClaim> {
    if !accepts_content_type(content_type) {
        return None;
    }
    let media = content_type?.split(';').next()?.trim().to_ascii_lowercase();
    let fields = if media == "application/json" {
        serde_json::from_slice::<FormFields>(body).ok()?
    } else {
        let mut fields = FormFields {
            username: None,
            password: None,
        };
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "username" => fields.username = Some(value.into_owned()),
                "password" => fields.password = Some(value.into_owned()),
                _ => {}
            }
        }
        fields
    };
    let username = fields.username.filter(|u| !u.is_empty())?;
    let password = fields.password.filter(|p| !p.is_empty())?;
    Some(PasswordClaim::new(username, password))
}

pub(crate) async fn verify(
    ctx: &VerifyContext<'_>,
    claim: &PasswordClaim,
) -> Result<Verdict, AuthError> {
    verify_password_claim(ctx, claim).await
}
