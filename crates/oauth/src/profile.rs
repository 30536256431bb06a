//! User profile and OpenID lookups made with a managed access token.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    error::{OAuthError, Result},
    manager::OAuthManager,
    request::{DataType, Method, RequestOptions, json_object},
};

/// Profile returned by the provider's `get_user_info` endpoint.
///
/// The JSON object is kept exactly as received, including `null` values and
/// empty arrays; the accessors read the documented fields out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    pub fn openid(&self) -> Option<&str> {
        self.str_field("openid")
    }

    pub fn nickname(&self) -> Option<&str> {
        self.str_field("nickname")
    }

    /// Gender as sent by the provider; a string or a number depending on the app.
    pub fn sex(&self) -> Option<&Value> {
        self.0.get("sex").filter(|v| !v.is_null())
    }

    pub fn province(&self) -> Option<&str> {
        self.str_field("province")
    }

    pub fn city(&self) -> Option<&str> {
        self.str_field("city")
    }

    pub fn country(&self) -> Option<&str> {
        self.str_field("country")
    }

    pub fn headimgurl(&self) -> Option<&str> {
        self.str_field("headimgurl")
    }

    /// String entries of `privilege`; empty when absent or `null`.
    pub fn privilege(&self) -> Vec<&str> {
        self.0
            .get("privilege")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Any field of the payload, by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The payload as received.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl OAuthManager {
    /// Fetch the profile of `openid`, refreshing the stored token first if it
    /// has expired. Fails with [`OAuthError::NoCredential`] before any network
    /// call when no token is stored.
    pub async fn fetch_profile(&self, openid: &str, lang: Option<&str>) -> Result<UserProfile> {
        let access_token = self.resolve_access_token(Some(openid)).await?;

        let mut data = vec![
            ("access_token", access_token.as_str()),
            ("openid", openid),
            ("oauth_consumer_key", self.config.app_id.as_str()),
        ];
        if let Some(lang) = lang {
            data.push(("lang", lang));
        }
        let options = RequestOptions::new()
            .method(Method::Get)
            .data(data)
            .data_type(DataType::Json);

        let value = self
            .api
            .request(&self.config.endpoints.profile_url, &options)
            .await?
            .into_json()?;
        debug!(openid, "fetched user profile");
        serde_json::from_value(value)
            .map_err(|e| OAuthError::Parse(format!("unexpected profile shape: {e}")))
    }

    /// Look up the OpenID that `access_token` was issued for.
    ///
    /// The endpoint answers with a JSONP envelope, `callback( {...} );`.
    pub async fn fetch_openid(&self, access_token: &str) -> Result<String> {
        let options = RequestOptions::new()
            .method(Method::Get)
            .data([("access_token", access_token)])
            .data_type(DataType::Text);
        let body = self
            .api
            .request(&self.config.endpoints.openid_url, &options)
            .await?
            .into_text();
        parse_openid(&body)
    }
}

fn parse_openid(body: &str) -> Result<String> {
    let value = json_object(body)
        .ok_or_else(|| OAuthError::Parse(format!("no JSON object in OpenID response: {body:?}")))?;
    value
        .get("openid")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OAuthError::Parse("OpenID response has no openid".into()))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            manager::tests::{CountingStore, FakeTransport, NOW, manager, record},
            storage::TokenStore,
        },
        std::sync::Arc,
    };

    const PROFILE: &str = r#"{
        "ret": 0,
        "msg": "",
        "openid": "OPENID",
        "nickname": "NICKNAME",
        "sex": "1",
        "province": "PROVINCE",
        "city": "CITY",
        "country": "COUNTRY",
        "headimgurl": "http://example.com/46",
        "privilege": ["PRIVILEGE1", "PRIVILEGE2"],
        "figureurl_qq_1": "http://example.com/40"
    }"#;

    #[tokio::test]
    async fn fetches_profile_with_valid_token() {
        let transport = FakeTransport::replying(vec![Ok(PROFILE.into())]);
        let store = Arc::new(CountingStore::default());
        store.set(record("A1", "R1", NOW)).await.unwrap();
        let mgr = manager(transport.clone(), store);

        let profile = mgr.fetch_profile("OPENID", Some("en")).await.unwrap();
        assert_eq!(profile.nickname(), Some("NICKNAME"));
        assert_eq!(profile.sex(), Some(&Value::from("1")));
        assert_eq!(profile.privilege(), vec!["PRIVILEGE1", "PRIVILEGE2"]);
        assert_eq!(profile.get("figureurl_qq_1").unwrap(), "http://example.com/40");

        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.param(0, "access_token").as_deref(), Some("A1"));
        assert_eq!(transport.param(0, "openid").as_deref(), Some("OPENID"));
        assert_eq!(
            transport.param(0, "oauth_consumer_key").as_deref(),
            Some("101")
        );
        assert_eq!(transport.param(0, "lang").as_deref(), Some("en"));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, crate::defaults::PROFILE_URL);
        assert_eq!(calls[0].1.method, Some(Method::Get));
    }

    #[tokio::test]
    async fn refreshes_expired_token_before_fetching() {
        let transport = FakeTransport::replying(vec![
            Ok("access_token=A2&expires_in=7200&refresh_token=R2".into()),
            Ok(PROFILE.into()),
        ]);
        let store = Arc::new(CountingStore::default());
        store.set(record("A1", "R1", NOW - 8_000_000)).await.unwrap();
        let mgr = manager(transport.clone(), store);

        mgr.fetch_profile("OPENID", None).await.unwrap();
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.param(0, "refresh_token").as_deref(), Some("R1"));
        assert_eq!(transport.param(1, "access_token").as_deref(), Some("A2"));
        assert_eq!(transport.param(1, "lang"), None);
    }

    #[tokio::test]
    async fn no_token_fails_before_network() {
        let transport = FakeTransport::replying(vec![]);
        let mgr = manager(transport.clone(), Arc::new(CountingStore::default()));
        let err = mgr.fetch_profile("OPENID", None).await.unwrap_err();
        assert!(matches!(
            &err,
            OAuthError::NoCredential { openid: Some(id) } if id == "OPENID"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_on_profile() {
        let transport = FakeTransport::replying(vec![Ok(
            r#"{"ret":1002,"msg":"please login"}"#.into(),
        )]);
        let store = Arc::new(CountingStore::default());
        store.set(record("A1", "R1", NOW)).await.unwrap();
        let mgr = manager(transport, store);
        let err = mgr.fetch_profile("OPENID", None).await.unwrap_err();
        match err {
            OAuthError::Provider { code, message } => {
                assert_eq!(code, 1002);
                assert_eq!(message, "please login");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetches_openid_from_jsonp() {
        let transport = FakeTransport::replying(vec![Ok(
            "callback( {\"client_id\":\"101\",\"openid\":\"OPENID\"} );\n".into(),
        )]);
        let mgr = manager(transport.clone(), Arc::new(CountingStore::default()));
        assert_eq!(mgr.fetch_openid("A1").await.unwrap(), "OPENID");
        assert_eq!(transport.param(0, "access_token").as_deref(), Some("A1"));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, crate::defaults::OPENID_URL);
    }

    #[test]
    fn openid_parse_failures() {
        assert!(matches!(parse_openid("garbage"), Err(OAuthError::Parse(_))));
        assert!(matches!(
            parse_openid("callback( {\"client_id\":\"101\"} );"),
            Err(OAuthError::Parse(_))
        ));
        assert_eq!(parse_openid(r#"{"openid":"X"}"#).unwrap(), "X");
    }

    #[tokio::test]
    async fn exchange_then_profile_over_http() {
        use {
            crate::{OAuthConfig, types::Endpoints},
            wiremock::{
                Mock, MockServer, ResponseTemplate,
                matchers::{body_string_contains, method, path, query_param},
            },
        };

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=CODE"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("access_token=A1&expires_in=7776000&refresh_token=R1"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/get_user_info"))
            .and(query_param("access_token", "A1"))
            .and(query_param("openid", "OPENID"))
            .and(query_param("oauth_consumer_key", "101"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE))
            .expect(1)
            .mount(&server)
            .await;

        let mgr = OAuthManager::new(
            OAuthConfig::new("101", "secret").with_endpoints(Endpoints::with_base(&server.uri())),
        );
        mgr.exchange_code("CODE").await.unwrap();
        let profile = mgr.fetch_profile("OPENID", None).await.unwrap();
        assert_eq!(profile.openid(), Some("OPENID"));
    }

    #[test]
    fn profile_serializes_back_with_extra_fields() {
        let profile: UserProfile = serde_json::from_str(PROFILE).unwrap();
        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["ret"], 0);
        assert_eq!(back["sex"], "1");
        assert_eq!(back["figureurl_qq_1"], "http://example.com/40");
    }

    #[test]
    fn null_and_empty_fields_survive_round_trip() {
        let body = r#"{"ret":0,"nickname":null,"privilege":[],"city":""}"#;
        let profile: UserProfile = serde_json::from_str(body).unwrap();
        assert_eq!(profile.nickname(), None);
        assert!(profile.privilege().is_empty());
        assert_eq!(profile.city(), Some(""));

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(body).unwrap());
    }

    #[test]
    fn null_privilege_parses_as_empty() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"ret":0,"privilege":null,"sex":null}"#).unwrap();
        assert!(profile.privilege().is_empty());
        assert_eq!(profile.sex(), None);
        assert_eq!(profile.get("privilege"), Some(&Value::Null));
        assert_eq!(profile.into_map().len(), 3);
    }
}
