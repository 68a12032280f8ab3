use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::*;
use r2d2::Pool;
use serde::Deserialize;

use crate::auth::{Token, TokenKeys};
use crate::error::BarError;
use crate::persistence::Storage;
use crate::services::{Commandable, Queryable, Request};

/// Login material as stored: `password` holds a bcrypt hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub login: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Register {
    pub credentials: Credentials,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LogIn {
    pub credentials: Credentials,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Accounts<M: r2d2::ManageConnection> {
    db: Pool<M>,
    tokens: Arc<TokenKeys>,
    password_cost: u32,
}

pub(crate) fn hash_password(password: &str, cost: u32) -> Result<String, BarError> {
    bcrypt::hash(password, cost)
        .map_err(|e| BarError::Internal(anyhow::Error::new(e).context("hash password")))
}

pub(crate) fn verify_password(stored: &str, password: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(matches) => matches,
        Err(e) => {
            warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

impl Credentials {
    fn validate(&self) -> Result<(), BarError> {
        if self.login.trim().is_empty() || self.password.is_empty() {
            return Err(BarError::BadRequest("login and password are required".into()));
        }
        Ok(())
    }
}

impl Request for Register {
    type Resp = Token;
}

impl Request for LogIn {
    type Resp = Token;
}

impl<M> Accounts<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    pub fn new(db: Pool<M>, tokens: Arc<TokenKeys>, password_cost: u32) -> Self {
        Accounts {
            db,
            tokens,
            password_cost,
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.service({
            let me = self.clone();
            web::resource("/register").route(web::post().to(
                move |creds: web::Json<Credentials>| {
                    let me = me.clone();
                    async move { me.register(creds.into_inner()).await }
                },
            ))
        })
        .service({
            let me = self.clone();
            web::resource("/login").route(web::get().to(move |creds: web::Json<Credentials>| {
                let me = me.clone();
                async move { me.log_in(creds.into_inner()).await }
            }))
        });
    }

    async fn register(&self, credentials: Credentials) -> Result<HttpResponse, BarError> {
        info!("Register {:?}", credentials.login);
        let me = self.clone();
        let req = Register {
            credentials,
            at: Utc::now(),
        };
        let token = crate::blocking(move || me.execute(req)).await?;
        Ok(HttpResponse::Ok().json(token))
    }

    async fn log_in(&self, credentials: Credentials) -> Result<HttpResponse, BarError> {
        info!("Log in {:?}", credentials.login);
        let me = self.clone();
        let req = LogIn {
            credentials,
            at: Utc::now(),
        };
        let token = crate::blocking(move || me.query(req)).await?;
        Ok(HttpResponse::Ok().json(token))
    }
}

impl<M> Commandable<Register> for Accounts<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn execute(&self, req: Register) -> Result<Token, BarError> {
        let Register { credentials, at } = req;
        credentials.validate()?;
        let hashed = hash_password(&credentials.password, self.password_cost)?;
        let account = self
            .db
            .get()?
            .create_user(&credentials.login, &hashed, at)?;
        self.tokens.issue(account.id, &account.login, at)
    }
}

impl<M> Queryable<LogIn> for Accounts<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn query(&self, req: LogIn) -> Result<Token, BarError> {
        let LogIn { credentials, at } = req;
        credentials.validate()?;
        let account = self
            .db
            .get()?
            .find_account(&credentials.login)?
            .filter(|a| verify_password(&a.password, &credentials.password))
            .ok_or(BarError::NotFound("user"))?;
        self.tokens.issue(account.id, &account.login, at)
    }
}

impl<M: r2d2::ManageConnection> Clone for Accounts<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        let tokens = self.tokens.clone();
        let password_cost = self.password_cost;
        Accounts {
            db,
            tokens,
            password_cost,
        }
    }
}
