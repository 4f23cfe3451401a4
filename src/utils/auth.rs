use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // username
    pub sid: String, // session id
    pub exp: usize,
    pub jti: String,
}

/// Signs a token for `session_id` that expires together with the session.
pub fn create_jwt(
    username: &str,
    session_id: &str,
    secret: &str,
    expires_at: DateTime<Utc>,
) -> Result<String> {
    let expiration = usize::try_from(expires_at.timestamp())
        .map_err(|_| anyhow!("session expiry {} is before the epoch", expires_at))?;

    let claims = Claims {
        sub: username.to_owned(),
        sid: session_id.to_owned(),
        exp: expiration,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
