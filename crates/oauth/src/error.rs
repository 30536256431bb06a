/// Errors surfaced by the QQ Connect client.
///
/// Nothing in this crate retries: every variant reaches the immediate caller
/// of the failing operation.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The HTTP call itself failed (connect, timeout, non-2xx status).
    #[error("QQAPI transport error: {0:#}")]
    Transport(#[source] anyhow::Error),

    /// The provider answered with a nonzero error code.
    #[error("QQAPI Error {code}: {message}")]
    Provider { code: i64, message: String },

    /// No token record is stored; the code exchange never happened.
    #[error(
        "no token for {}, please authorize first",
        .openid.as_deref().unwrap_or("the current user")
    )]
    NoCredential { openid: Option<String> },

    /// The response body could not be decoded.
    #[error("malformed provider response: {0}")]
    Parse(String),

    /// The credential store failed to load or save.
    #[error("token store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl OAuthError {
    /// Provider error code, if this is a provider-level failure.
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            Self::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = OAuthError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_carries_provider_label() {
        let err = OAuthError::Transport(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "QQAPI transport error: connection reset");
    }

    #[test]
    fn provider_error_formats_code_and_message() {
        let err = OAuthError::Provider {
            code: 100015,
            message: "access token check failed".into(),
        };
        assert_eq!(err.provider_code(), Some(100015));
        assert!(err.to_string().contains("100015"));
        assert!(err.to_string().contains("access token check failed"));
    }

    #[test]
    fn no_credential_names_the_openid() {
        let err = OAuthError::NoCredential {
            openid: Some("OPENID".into()),
        };
        assert_eq!(err.to_string(), "no token for OPENID, please authorize first");

        let err = OAuthError::NoCredential { openid: None };
        assert!(err.to_string().contains("the current user"));
        assert_eq!(err.provider_code(), None);
    }
}
