//! Bearer tokens and the identity they carry.

use std::convert::TryFrom;
use std::future::{ready, Ready};
use std::time::Duration;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::BarError;

/// Account number of the barman; everyone else is a visitor.
pub const BARMAN_ACCOUNT_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Barman,
    Visitor,
}

/// Who is making the request, as vouched for by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub login: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    role: Role,
    id: i64,
    login: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub token: String,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

pub fn resolve_role(id: i64) -> Role {
    if id == BARMAN_ACCOUNT_ID {
        Role::Barman
    } else {
        Role::Visitor
    }
}

/// Extracts the credential from an `Authorization` value of exactly the
/// form `Bearer <token>`.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Some(token)
        }
        _ => None,
    }
}

impl Identity {
    pub fn require(&self, role: Role) -> Result<(), BarError> {
        if self.role != role {
            info!(
                "{} ({:?}) refused: needs {:?}",
                self.login, self.role, role
            );
            return Err(BarError::Unauthorized);
        }
        Ok(())
    }
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        if config.signing_key.is_empty() {
            anyhow::bail!("auth.signing_key is empty; set it in the config or $RUSTBAR_SIGNING_KEY");
        }
        Ok(Self::new(
            config.signing_key.as_bytes(),
            Duration::from_secs(config.token_ttl_secs),
        ))
    }

    pub fn issue(&self, id: i64, login: &str, now: DateTime<Utc>) -> Result<Token, BarError> {
        let iat = now.timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or_else(|| {
                BarError::Internal(anyhow::anyhow!("token ttl {:?} overflows", self.ttl))
            })?;
        let claims = Claims {
            role: resolve_role(id),
            id,
            login: login.to_string(),
            iat,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BarError::Internal(anyhow::Error::new(e).context("sign token")))?;
        debug!("Issued {:?} token for {}", claims.role, login);
        Ok(Token { token })
    }

    pub fn verify(&self, token: &str) -> Result<Identity, BarError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                BarError::Unauthenticated
            })?;
        let Claims { id, login, role, .. } = data.claims;
        Ok(Identity { id, login, role })
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("TokenKeys")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl FromRequest for Identity {
    type Error = BarError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(identify(req))
    }
}

fn identify(req: &HttpRequest) -> Result<Identity, BarError> {
    let keys = req.app_data::<web::Data<TokenKeys>>().ok_or_else(|| {
        BarError::Internal(anyhow::anyhow!("token keys are not registered"))
    })?;
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(BarError::Unauthenticated)?
        .to_str()
        .map_err(|_| BarError::Unauthenticated)?;
    let token = parse_bearer(value).ok_or(BarError::Unauthenticated)?;
    keys.verify(token)
}
