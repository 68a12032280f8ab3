use std::sync::Arc;

use actix_web::web;
use anyhow::Context;
use infra::pool::PgManager;
use log::*;
use r2d2::Pool;

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod menu;
pub mod orders;
pub mod persistence;
pub mod services;
pub mod visitor;

#[cfg(test)]
mod test;

use crate::accounts::Accounts;
use crate::auth::TokenKeys;
use crate::error::BarError;
use crate::menu::{DrinkCatalog, Menu};
use crate::orders::Orders;
use crate::persistence::Storage;

pub struct RustBar<M: r2d2::ManageConnection> {
    accounts: Accounts<M>,
    menu: Menu<M>,
    orders: Orders<M>,
    tokens: web::Data<TokenKeys>,
}

/// Runs store work on the blocking pool, off the request workers.
pub(crate) async fn blocking<R, F>(f: F) -> Result<R, BarError>
where
    F: FnOnce() -> Result<R, BarError> + Send + 'static,
    R: Send + 'static,
{
    web::block(f).await?
}

impl RustBar<PgManager> {
    pub fn from_config(config: &config::Config) -> anyhow::Result<Self> {
        let db = config.postgres.build()?;

        debug!("Init schema");
        db.get()?.setup().context("Setup persistence")?;

        let tokens = TokenKeys::from_config(&config.auth)?;
        let bar = RustBar::new(db, tokens, config.auth.password_cost).context("load drinks")?;
        Ok(bar)
    }
}

impl<M> RustBar<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    pub fn new(db: Pool<M>, tokens: TokenKeys, password_cost: u32) -> Result<Self, BarError> {
        let catalog = Arc::new(DrinkCatalog::new());
        catalog.load(db.get()?.load_drinks()?);

        let tokens = web::Data::new(tokens);
        let accounts = Accounts::new(db.clone(), tokens.clone().into_inner(), password_cost);
        let menu = Menu::new(db.clone(), catalog.clone());
        let orders = Orders::new(db, catalog);

        Ok(RustBar {
            accounts,
            menu,
            orders,
            tokens,
        })
    }

    pub fn menu(&self) -> &Menu<M> {
        &self.menu
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        info!("Booting rustbar");

        cfg.app_data(self.tokens.clone())
            .app_data(
                web::JsonConfig::default()
                    .content_type_required(false)
                    .error_handler(|err, _| BarError::BadRequest(err.to_string()).into()),
            );

        self.accounts.configure(cfg);
        self.menu.configure(cfg);
        self.orders.configure(cfg);
    }
}

impl<M: r2d2::ManageConnection> Clone for RustBar<M> {
    fn clone(&self) -> Self {
        RustBar {
            accounts: self.accounts.clone(),
            menu: self.menu.clone(),
            orders: self.orders.clone(),
            tokens: self.tokens.clone(),
        }
    }
}
