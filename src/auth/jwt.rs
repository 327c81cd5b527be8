use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, state::AppState};

/// Tokens are minted by the identity service; only access tokens open the API.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }
}

/// Owner of the request. Every data route is scoped to this id.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Access token required".to_string(),
            ));
        }

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test";

    fn cfg(issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: SECRET.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    fn sign(user_id: Uuid, kind: TokenKind, issuer: &str, audience: &str) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + 300,
            iss: issuer.into(),
            aud: audience.into(),
            kind,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
            .expect("sign token")
    }

    async fn extract(header: Option<String>) -> Result<AuthUser, (StatusCode, String)> {
        let state = AppState::fake(std::sync::Arc::new(
            crate::ai::client::scripted::ScriptedClient::default(),
        ));
        let mut builder = Request::builder().uri("/api/meals");
        if let Some(h) = header {
            builder = builder.header(axum::http::header::AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, &state).await
    }

    #[test]
    fn verifies_access_tokens() {
        let keys = JwtKeys::new(&cfg("iss", "aud"));
        let user_id = Uuid::new_v4();
        let claims = keys
            .verify_access(&sign(user_id, TokenKind::Access, "iss", "aud"))
            .expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn rejects_refresh_tokens_and_foreign_audiences() {
        let keys = JwtKeys::new(&cfg("iss", "aud"));
        let refresh = sign(Uuid::new_v4(), TokenKind::Refresh, "iss", "aud");
        assert!(keys.verify_access(&refresh).is_err());

        let foreign = sign(Uuid::new_v4(), TokenKind::Access, "other-iss", "other-aud");
        assert!(keys.verify(&foreign).is_err());
    }

    #[test]
    fn token_kind_accepts_both_spellings() {
        let k: TokenKind = serde_json::from_str(r#""Access""#).unwrap();
        assert_eq!(k, TokenKind::Access);
        let k: TokenKind = serde_json::from_str(r#""refresh""#).unwrap();
        assert_eq!(k, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn extractor_reads_bearer_tokens() {
        // AppState::fake uses issuer and audience "test".
        let user_id = Uuid::new_v4();
        let token = sign(user_id, TokenKind::Access, "test", "test");
        let AuthUser(got) = extract(Some(format!("Bearer {token}"))).await.unwrap();
        assert_eq!(got, user_id);

        let (status, _) = extract(None).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let refresh = sign(user_id, TokenKind::Refresh, "test", "test");
        let (status, msg) = extract(Some(format!("Bearer {refresh}"))).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Access token required");
    }
}
