use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::repo_types::Role;
use crate::config::JwtConfig;
use crate::state::AppState;

/// Signing and verification material for bearer tokens. Two TTL variants:
/// the short session token issued at login and the longer one handed back at
/// registration so the fresh account can talk to the API before confirming.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub registration_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            registration_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            registration_ttl: Duration::from_secs((registration_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_ttl(&self, user_id: Uuid, role: Role, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, role = %role, "bearer token signed");
        Ok(token)
    }

    pub fn sign_session(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.sign_with_ttl(user_id, role, self.session_ttl)
    }

    pub fn sign_registration(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.sign_with_ttl(user_id, role, self.registration_ttl)
    }

    /// Signature, expiry, issuer and audience are all checked; any failure is
    /// indistinguishable to the caller. There is no revocation list.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "bearer token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut config = AppConfig::fake();
        config.jwt = JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            session_ttl_minutes: 60,
            registration_ttl_minutes: 60 * 24,
        };
        let state = AppState::fake_with_config(config);
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.sign_session(user_id, Role::User).expect("sign session");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn registration_token_outlives_session_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let session = keys.sign_session(user_id, Role::User).expect("sign");
        let registration = keys
            .sign_registration(user_id, Role::User)
            .expect("sign");
        let session_exp = keys.verify(&session).expect("verify").exp;
        let registration_exp = keys.verify(&registration).expect("verify").exp;
        assert!(registration_exp > session_exp);
    }

    #[tokio::test]
    async fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good
            .sign_session(Uuid::new_v4(), Role::Admin)
            .expect("sign session");
        assert!(bad.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_tampered_signature() {
        let keys = make_keys("secret-a", "iss", "aud");
        let other = make_keys("secret-b", "iss", "aud");
        let token = keys
            .sign_session(Uuid::new_v4(), Role::User)
            .expect("sign session");
        assert!(other.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::User,
            iat: (now - TimeDuration::hours(3)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }
}
