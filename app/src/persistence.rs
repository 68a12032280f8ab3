use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use err_derive::Error;
use log::*;
use postgres::error::SqlState;
use postgres::Row;

use crate::accounts::Account;
use crate::menu::Drink;
use crate::visitor::Visitor;

/// A save lost a race against another writer of the same visitor.
#[derive(Error, Debug, PartialEq, Eq)]
#[error(display = "stale version")]
pub struct ConcurrencyError;

/// The store already holds a drink of this name.
#[derive(Error, Debug, PartialEq, Eq)]
#[error(display = "duplicate drink: {:?}", _0)]
pub struct DuplicateDrink(pub String);

/// Everything the bar needs from its backing store. Each operation is
/// atomic on its own; nothing spans more than one row.
pub trait Storage {
    fn setup(&mut self) -> Result<()>;
    /// Inserts a fresh visitor with the starting balance.
    fn create_user(&mut self, login: &str, password: &str, now: DateTime<Utc>) -> Result<Account>;
    fn find_account(&mut self, login: &str) -> Result<Option<Account>>;
    fn load_visitor(&mut self, login: &str) -> Result<Option<Visitor>>;
    /// Writes `visitor` back if nobody else has since the load, and bumps
    /// its version. Fails with [`ConcurrencyError`] otherwise.
    fn save_visitor(&mut self, visitor: &mut Visitor) -> Result<()>;
    fn load_drinks(&mut self) -> Result<Vec<Drink>>;
    /// Fails with [`DuplicateDrink`] if the name is taken.
    fn insert_drink(&mut self, drink: &Drink) -> Result<()>;
}

const SETUP_SQL: &str = include_str!("persistence.sql");
const CREATE_USER_SQL: &str = "INSERT INTO bar_user (login, password, money, ppm, is_alive, last_drink) \
                               VALUES ($1, $2, $3, 0, TRUE, $4) \
                               RETURNING id";
const FIND_ACCOUNT_SQL: &str = "SELECT id, login, password FROM bar_user WHERE login = $1";
const LOAD_VISITOR_SQL: &str = "SELECT id, login, money, ppm, is_alive, last_drink, version \
                                FROM bar_user WHERE login = $1";
const SAVE_VISITOR_SQL: &str = "UPDATE bar_user \
                                SET money = $1, ppm = $2, is_alive = $3, last_drink = $4, \
                                    version = version + 1 \
                                WHERE login = $5 AND version = $6";
const LOAD_DRINKS_SQL: &str = "SELECT name, price, ppm FROM drink";
const INSERT_DRINK_SQL: &str = "INSERT INTO drink (name, price, ppm) VALUES ($1, $2, $3)";

impl Storage for postgres::Client {
    fn setup(&mut self) -> Result<()> {
        self.batch_execute(SETUP_SQL).context("create tables")?;
        Ok(())
    }

    fn create_user(&mut self, login: &str, password: &str, now: DateTime<Utc>) -> Result<Account> {
        let row = self
            .query_one(
                CREATE_USER_SQL,
                &[&login, &password, &crate::visitor::STARTING_MONEY, &now],
            )
            .with_context(|| format!("create user {:?}", login))?;
        let id: i64 = row.try_get(0)?;
        debug!("Created user {} as #{}", login, id);
        Ok(Account {
            id,
            login: login.to_string(),
            password: password.to_string(),
        })
    }

    fn find_account(&mut self, login: &str) -> Result<Option<Account>> {
        let row = self.query_opt(FIND_ACCOUNT_SQL, &[&login])?;
        row.map(|row| -> Result<Account> {
            Ok(Account {
                id: row.try_get(0)?,
                login: row.try_get(1)?,
                password: row.try_get(2)?,
            })
        })
        .transpose()
    }

    fn load_visitor(&mut self, login: &str) -> Result<Option<Visitor>> {
        let row = self.query_opt(LOAD_VISITOR_SQL, &[&login])?;
        let visitor = row.as_ref().map(visitor_of_row).transpose()?;
        trace!("Load {} -> {:?}", login, visitor);
        Ok(visitor)
    }

    fn save_visitor(&mut self, visitor: &mut Visitor) -> Result<()> {
        let nrows = self.execute(
            SAVE_VISITOR_SQL,
            &[
                &visitor.money,
                &visitor.ppm,
                &visitor.is_alive,
                &visitor.last_drink_at,
                &visitor.login,
                &visitor.version,
            ],
        )?;
        debug!("Update modified {} rows", nrows);
        if nrows != 1 {
            warn!("Update of {} impacted {} rows not 1", visitor.login, nrows);
            return Err(ConcurrencyError.into());
        }
        visitor.version += 1;
        Ok(())
    }

    fn load_drinks(&mut self) -> Result<Vec<Drink>> {
        self.query(LOAD_DRINKS_SQL, &[])?
            .iter()
            .map(|row| -> Result<Drink> {
                Ok(Drink {
                    name: row.try_get(0)?,
                    price: row.try_get(1)?,
                    ppm_cost: row.try_get(2)?,
                })
            })
            .collect()
    }

    fn insert_drink(&mut self, drink: &Drink) -> Result<()> {
        match self.execute(
            INSERT_DRINK_SQL,
            &[&drink.name, &drink.price, &drink.ppm_cost],
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(DuplicateDrink(drink.name.clone()).into())
            }
            Err(e) => Err(e).context("insert drink"),
        }
    }
}

fn visitor_of_row(row: &Row) -> Result<Visitor> {
    Ok(Visitor {
        id: row.try_get(0)?,
        login: row.try_get(1)?,
        money: row.try_get(2)?,
        ppm: row.try_get(3)?,
        is_alive: row.try_get(4)?,
        last_drink_at: row.try_get(5)?,
        version: row.try_get(6)?,
    })
}
