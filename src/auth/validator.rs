use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AuthError, JwksClient, Principal};

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Audience,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// `aud` is either a single string or a list of them.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
    #[default]
    None,
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
            Audience::None => Vec::new(),
        }
    }
}

pub struct Validator {
    keys: JwksClient,
    issuer: String,
    client_id: String,
}

impl Validator {
    pub fn new(keys: JwksClient, issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            client_id: client_id.into(),
        }
    }

    /// Checks signature, expiry, issuer and audience, in that order.
    pub async fn validate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let result = self.verify(token).await;
        match &result {
            Err(AuthError::MissingToken) => debug!("request without bearer token"),
            Err(err) => warn!(error = %err, "rejected bearer token"),
            Ok(_) => {}
        }
        result
    }

    async fn verify(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;

        let header = decode_header(token).map_err(AuthError::Malformed)?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self.keys.key(&kid).await.map_err(AuthError::Key)?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(AuthError::Invalid)?
            .claims;

        debug!(azp = claims.azp.as_deref().unwrap_or("-"), "authorization attempt");

        let audience = claims.aud.into_vec();
        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            warn!(issuer = ?claims.iss, ?audience, "token issued by unexpected issuer");
            return Err(AuthError::Issuer);
        }
        if !audience.iter().any(|aud| *aud == self.client_id) {
            warn!(issuer = ?claims.iss, ?audience, "token not issued for this application");
            return Err(AuthError::Audience);
        }

        Ok(Principal {
            authorized_party: claims.azp,
            audience,
            subject: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};

    use httpmock::prelude::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const JWKS: &str = include_str!("../../tests/fixtures/jwkset.json");
    const SIGNING_KEY: &[u8] = include_bytes!("../../tests/fixtures/signing_key.pem");
    const FORGED_KEY: &[u8] = include_bytes!("../../tests/fixtures/forged_key.pem");
    const KID: &str = "authgate-test-key";
    const ISSUER: &str = "https://login.example.test/tenant/v2.0";
    const CLIENT_ID: &str = "authgate-client";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn sign(key: &[u8], claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_owned());
        encode(&header, &claims, &EncodingKey::from_rsa_pem(key).unwrap()).unwrap()
    }

    fn claims() -> serde_json::Value {
        json!({
            "iss": ISSUER,
            "aud": [CLIENT_ID],
            "azp": "consumer-app",
            "sub": "subject-1",
            "exp": now() + 3600,
        })
    }

    async fn validator(server: &MockServer) -> Validator {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(JWKS);
            })
            .await;
        let keys = JwksClient::new(server.url("/keys"), reqwest::Client::new());
        Validator::new(keys, ISSUER, CLIENT_ID)
    }

    #[tokio::test]
    async fn accepts_token_for_this_application() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;

        let principal = validator
            .validate(Some(&sign(SIGNING_KEY, claims())))
            .await
            .unwrap();

        assert_eq!(principal.authorized_party.as_deref(), Some("consumer-app"));
        assert_eq!(principal.audience, vec![CLIENT_ID.to_owned()]);
        assert_eq!(principal.subject.as_deref(), Some("subject-1"));
    }

    #[tokio::test]
    async fn accepts_single_string_audience() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut claims = claims();
        claims["aud"] = json!(CLIENT_ID);

        assert!(validator.validate(Some(&sign(SIGNING_KEY, claims))).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;

        let err = validator.validate(None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[tokio::test]
    async fn rejects_other_audience() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut claims = claims();
        claims["aud"] = json!(["someone-else"]);

        let err = validator.validate(Some(&sign(SIGNING_KEY, claims))).await.unwrap_err();
        assert!(matches!(err, AuthError::Audience));
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn rejection_logs_claims_but_not_the_token() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut claims = claims();
        claims["aud"] = json!(["another-app"]);
        let token = sign(SIGNING_KEY, claims);

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let err = {
            let _guard = tracing::subscriber::set_default(subscriber);
            validator.validate(Some(&token)).await.unwrap_err()
        };

        assert!(matches!(err, AuthError::Audience));
        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("WARN") && line.contains("token not issued for this application"))
            .unwrap_or_else(|| panic!("no audience warning in:\n{output}"));
        assert!(line.contains("issuer="), "{line}");
        assert!(line.contains(ISSUER), "{line}");
        assert!(line.contains("audience="), "{line}");
        assert!(line.contains("another-app"), "{line}");
        assert!(output.contains("consumer-app"), "azp is logged at debug:\n{output}");
        assert!(!output.contains(&token), "token leaked into logs:\n{output}");
    }

    #[tokio::test]
    async fn rejects_other_issuer() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut claims = claims();
        claims["iss"] = json!("https://evil.example.test");

        let err = validator.validate(Some(&sign(SIGNING_KEY, claims))).await.unwrap_err();
        assert!(matches!(err, AuthError::Issuer));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut claims = claims();
        claims["exp"] = json!(now() - 3600);

        let err = validator.validate(Some(&sign(SIGNING_KEY, claims))).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn rejects_forged_signature() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;

        let err = validator
            .validate(Some(&sign(FORGED_KEY, claims())))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;

        let err = validator.validate(Some("not-a-jwt")).await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn rejects_symmetric_algorithms() {
        let server = MockServer::start_async().await;
        let validator = validator(&server).await;
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.to_owned());
        let token = encode(&header, &claims(), &EncodingKey::from_secret(b"secret")).unwrap();

        let err = validator.validate(Some(&token)).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm(Algorithm::HS256)));
    }
}
