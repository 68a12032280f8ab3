use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::*;
use r2d2::Pool;
use serde::Deserialize;

use crate::auth::{Identity, Role};
use crate::error::BarError;
use crate::menu::DrinkCatalog;
use crate::persistence::Storage;
use crate::services::{Commandable, Queryable, Request};
use crate::visitor::Visitor;

#[derive(Debug)]
pub struct Orders<M: r2d2::ManageConnection> {
    db: Pool<M>,
    catalog: Arc<DrinkCatalog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyDrink {
    pub login: String,
    pub drink: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowVisitor {
    pub login: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct BuyQuery {
    name: String,
}

impl Request for BuyDrink {
    type Resp = Visitor;
}

impl Request for ShowVisitor {
    type Resp = Visitor;
}

impl<M> Orders<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    pub fn new(db: Pool<M>, catalog: Arc<DrinkCatalog>) -> Self {
        Orders { db, catalog }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.service({
            let me = self.clone();
            web::resource("/me").route(web::get().to(move |who: Identity| {
                let me = me.clone();
                async move { me.me(who).await }
            }))
        })
        .service({
            let me = self.clone();
            web::resource("/buy").route(web::patch().to(
                move |who: Identity, req: HttpRequest| {
                    let me = me.clone();
                    async move { me.buy(who, req).await }
                },
            ))
        });
    }

    async fn me(&self, who: Identity) -> Result<HttpResponse, BarError> {
        who.require(Role::Visitor)?;
        let me = self.clone();
        let req = ShowVisitor {
            login: who.login,
            at: Utc::now(),
        };
        let visitor = crate::blocking(move || me.query(req)).await?;
        Ok(HttpResponse::Ok().json(visitor))
    }

    async fn buy(&self, who: Identity, req: HttpRequest) -> Result<HttpResponse, BarError> {
        who.require(Role::Visitor)?;
        let BuyQuery { name: drink } = web::Query::<BuyQuery>::from_query(req.query_string())
            .map_err(|e| BarError::BadRequest(e.to_string()))?
            .into_inner();
        debug!("{} orders {:?}", who.login, drink);
        let me = self.clone();
        let req = BuyDrink {
            login: who.login,
            drink,
            at: Utc::now(),
        };
        let visitor = crate::blocking(move || me.execute(req)).await?;
        Ok(HttpResponse::Ok().json(visitor))
    }
}

impl<M> Commandable<BuyDrink> for Orders<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn execute(&self, req: BuyDrink) -> Result<Visitor, BarError> {
        let BuyDrink { login, drink, at } = req;
        let mut conn = self.db.get()?;
        super::purchase(&mut *conn, &self.catalog, &login, &drink, at)
    }
}

impl<M> Queryable<ShowVisitor> for Orders<M>
where
    M: r2d2::ManageConnection,
    M::Connection: Storage,
{
    fn query(&self, req: ShowVisitor) -> Result<Visitor, BarError> {
        let mut conn = self.db.get()?;
        super::load_living(&mut *conn, &req.login, req.at)
    }
}

impl<M: r2d2::ManageConnection> Clone for Orders<M> {
    fn clone(&self) -> Self {
        let db = self.db.clone();
        let catalog = self.catalog.clone();
        Orders { db, catalog }
    }
}
