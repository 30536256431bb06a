//! Parsing of the token endpoint's `key=value&key=value` response body.

use std::collections::HashMap;

use secrecy::Secret;

use crate::{
    error::{OAuthError, Result},
    types::TokenRecord,
};

/// Fields issued by the token endpoint, before the record is stamped.
pub(crate) struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl TokenGrant {
    /// Build the record to persist. A grant without a refresh token keeps
    /// `fallback_refresh`; without either the grant is rejected.
    pub fn into_record(
        self,
        fallback_refresh: Option<&str>,
        acquired_at: u64,
    ) -> Result<TokenRecord> {
        let refresh_token = match (self.refresh_token, fallback_refresh) {
            (Some(token), _) => token,
            (None, Some(previous)) => previous.to_string(),
            (None, None) => {
                return Err(OAuthError::Parse(
                    "token response is missing refresh_token".into(),
                ));
            },
        };
        Ok(TokenRecord {
            access_token: Secret::new(self.access_token),
            refresh_token: Secret::new(refresh_token),
            expires_in: self.expires_in,
            acquired_at,
        })
    }
}

/// Decode and validate a token endpoint body.
///
/// Values are URL-decoded. `access_token` must be non-empty and `expires_in`
/// must be an unsigned integer; any timestamp the provider sends is ignored.
pub(crate) fn parse_token_response(body: &str) -> Result<TokenGrant> {
    let mut fields: HashMap<String, String> = url::form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect();

    let access_token = fields
        .remove("access_token")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::Parse("token response is missing access_token".into()))?;

    let expires_in = fields
        .remove("expires_in")
        .ok_or_else(|| OAuthError::Parse("token response is missing expires_in".into()))?;
    let expires_in = expires_in.trim().parse::<u64>().map_err(|e| {
        OAuthError::Parse(format!("token response has invalid expires_in {expires_in:?}: {e}"))
    })?;

    let refresh_token = fields.remove("refresh_token").filter(|t| !t.is_empty());

    Ok(TokenGrant {
        access_token,
        refresh_token,
        expires_in,
    })
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn parses_standard_body() {
        let grant =
            parse_token_response("access_token=A2&expires_in=7200&refresh_token=R2").unwrap();
        assert_eq!(grant.access_token, "A2");
        assert_eq!(grant.expires_in, 7200);
        assert_eq!(grant.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn url_decodes_values_and_ignores_unknown_keys() {
        let grant = parse_token_response(
            "access_token=A%2B1%3D&expires_in=60&refresh_token=R&create_at=1&openid=X\n",
        )
        .unwrap();
        assert_eq!(grant.access_token, "A+1=");
        assert_eq!(grant.expires_in, 60);
    }

    #[test]
    fn rejects_missing_or_empty_access_token() {
        assert!(matches!(
            parse_token_response("expires_in=7200&refresh_token=R"),
            Err(OAuthError::Parse(_))
        ));
        assert!(matches!(
            parse_token_response("access_token=&expires_in=7200"),
            Err(OAuthError::Parse(_))
        ));
    }

    #[test]
    fn rejects_bad_expires_in() {
        assert!(parse_token_response("access_token=A").is_err());
        assert!(parse_token_response("access_token=A&expires_in=soon").is_err());
        assert!(parse_token_response("access_token=A&expires_in=-5").is_err());
    }

    #[test]
    fn record_keeps_previous_refresh_token_when_omitted() {
        let grant = parse_token_response("access_token=A2&expires_in=7200").unwrap();
        let record = grant.into_record(Some("R1"), 99).unwrap();
        assert_eq!(record.refresh_token.expose_secret(), "R1");
        assert_eq!(record.acquired_at, 99);
    }

    #[test]
    fn record_without_any_refresh_token_is_rejected() {
        let grant = parse_token_response("access_token=A2&expires_in=7200").unwrap();
        assert!(matches!(
            grant.into_record(None, 1),
            Err(OAuthError::Parse(_))
        ));
    }
}
