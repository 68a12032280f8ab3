//! A patron's wallet and blood alcohol, and the rules that move them.
//!
//! Nothing here touches storage; callers load a [`Visitor`], apply
//! [`Visitor::decay`] and then [`Visitor::buy`], and persist the result.

use chrono::{DateTime, Utc};
use err_derive::Error;
use serde::Serialize;

use crate::menu::{Drink, DrinkCatalog};

/// At or above this many ppm a visitor is dead.
pub const LETHAL_DOSE: f64 = 6.0;
pub const STARTING_MONEY: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visitor {
    pub id: i64,
    pub login: String,
    pub money: i64,
    pub ppm: f64,
    pub is_alive: bool,
    #[serde(skip)]
    pub last_drink_at: DateTime<Utc>,
    /// Bumped by the store on every save; a stale copy cannot be saved.
    #[serde(skip)]
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Served,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(display = "no money")]
pub struct InsufficientFunds;

impl Visitor {
    pub fn register(id: i64, login: &str, now: DateTime<Utc>) -> Self {
        Visitor {
            id,
            login: login.to_string(),
            money: STARTING_MONEY,
            ppm: 0.0,
            is_alive: true,
            last_drink_at: now,
            version: 0,
        }
    }

    /// Sobers up by one ppm per elapsed minute since the last drink,
    /// rounded to the nearest minute.
    pub fn decay(&mut self, now: DateTime<Utc>) {
        let elapsed = now.signed_duration_since(self.last_drink_at);
        let minutes = (elapsed.num_milliseconds().max(0) as f64 / 60_000.0).round();
        self.ppm = (self.ppm - minutes).max(0.0);
    }

    pub fn buy(&mut self, drink: &Drink, now: DateTime<Utc>) -> Result<Outcome, InsufficientFunds> {
        if drink.price > self.money {
            return Err(InsufficientFunds);
        }
        self.money -= drink.price;
        self.ppm += drink.ppm_cost;

        // The last drink timestamp stays put on death; nothing decays a corpse.
        if self.ppm >= LETHAL_DOSE {
            self.is_alive = false;
            return Ok(Outcome::Fatal);
        }

        self.last_drink_at = now;
        Ok(Outcome::Served)
    }

    /// Everything on the menu this visitor can pay for.
    pub fn available(&self, catalog: &DrinkCatalog) -> Vec<Drink> {
        catalog
            .list()
            .into_iter()
            .filter(|d| d.price <= self.money)
            .collect()
    }
}
