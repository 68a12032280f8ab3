use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::*;
use r2d2::Pool;

use super::catalog::DrinkCatalog;
use super::models::Drink;
use crate::auth::{Identity, Role};
use crate::error::BarError;
use crate::orders::load_living;
use crate::persistence::Storage;
use crate::services::{Commandable, Queryable, Request};

#[derive(Debug)]
pub struct Menu<M: r2d2::ManageConnection> {
    db: Pool<M>,
    catalog: Arc<DrinkCatalog>,
}

/// The whole catalog, as the barman sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowMenu;

/// What a visitor can currently pay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffordableDrinks {
    pub login: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddDrink(pub Drink);

impl Request for ShowMenu {
    type Resp = Vec<Drink>;
}

impl Request for AffordableDrinks {
    type Resp = Vec<Drink>;
}

impl Request for AddDrink {
    type Resp = BTreeMap<String, Drink>;
}

impl<M> Menu<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    pub fn new(db: Pool<M>, catalog: Arc<DrinkCatalog>) -> Self {
        Menu { db, catalog }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.service({
            let me = self.clone();
            web::resource("/create").route(web::post().to(
                move |who: Identity, body: web::Bytes| {
                    let me = me.clone();
                    async move { me.create(who, body).await }
                },
            ))
        })
        .service({
            let me = self.clone();
            web::resource("/list").route(web::get().to(move |who: Identity| {
                let me = me.clone();
                async move { me.list(who).await }
            }))
        });
    }

    // Role first: a wrong-role caller gets 401 whatever the body holds.
    async fn create(&self, who: Identity, body: web::Bytes) -> Result<HttpResponse, BarError> {
        who.require(Role::Barman)?;
        let drink: Drink =
            serde_json::from_slice(&body).map_err(|e| BarError::BadRequest(e.to_string()))?;
        info!("{} adds {:?}", who.login, drink);
        let me = self.clone();
        let menu = crate::blocking(move || me.execute(AddDrink(drink))).await?;
        Ok(HttpResponse::Ok().json(menu))
    }

    async fn list(&self, who: Identity) -> Result<HttpResponse, BarError> {
        let drinks = match who.role {
            Role::Barman => self.query(ShowMenu)?,
            Role::Visitor => {
                let me = self.clone();
                let req = AffordableDrinks {
                    login: who.login,
                    at: Utc::now(),
                };
                crate::blocking(move || me.query(req)).await?
            }
        };
        Ok(HttpResponse::Ok().json(drinks))
    }
}

impl<M> Queryable<ShowMenu> for Menu<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn query(&self, _: ShowMenu) -> Result<Vec<Drink>, BarError> {
        Ok(self.catalog.list())
    }
}

impl<M> Queryable<AffordableDrinks> for Menu<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn query(&self, req: AffordableDrinks) -> Result<Vec<Drink>, BarError> {
        let mut conn = self.db.get()?;
        let visitor = load_living(&mut *conn, &req.login, req.at)?;
        Ok(visitor.available(&self.catalog))
    }
}

impl<M> Commandable<AddDrink> for Menu<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn execute(&self, AddDrink(drink): AddDrink) -> Result<BTreeMap<String, Drink>, BarError> {
        drink.validate()?;
        self.catalog.add(drink, |d| {
            let mut conn = self.db.get()?;
            conn.insert_drink(d).map_err(BarError::from)
        })?;
        Ok(self.catalog.snapshot())
    }
}

impl<M: r2d2::ManageConnection> Clone for Menu<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        let catalog = self.catalog.clone();
        Menu { db, catalog }
    }
}
