use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::RngCore,
};

/// Anchor the provider expects on its authorize page.
const REDIRECT_ANCHOR: &str = "qq_redirect";

/// Generate a random state parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the URL the user is sent to for consent.
pub fn build_authorize_url(base: &str, app_id: &str, redirect_uri: &str, state: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", app_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state)
        .finish();
    format!("{base}?{query}#{REDIRECT_ANCHOR}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_has_expected_shape() {
        let url = build_authorize_url(
            "https://graph.qq.com/oauth2.0/authorize",
            "101",
            "https://example.com/cb?x=1",
            "xyz",
        );
        assert_eq!(
            url,
            "https://graph.qq.com/oauth2.0/authorize?client_id=101\
             &redirect_uri=https%3A%2F%2Fexample.com%2Fcb%3Fx%3D1\
             &response_type=code&state=xyz#qq_redirect"
        );
    }

    #[test]
    fn states_are_random_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
