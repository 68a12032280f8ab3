//! Buying drinks: the read-check-buy-persist sequence over one visitor row.

use chrono::{DateTime, Utc};
use log::*;

use crate::error::BarError;
use crate::menu::DrinkCatalog;
use crate::persistence::Storage;
use crate::visitor::{Outcome, Visitor};

mod resources;

pub use self::resources::{BuyDrink, Orders, ShowVisitor};

/// Loads `login` as of `now`; the dead are turned away.
pub(crate) fn load_living<S: Storage>(
    store: &mut S,
    login: &str,
    now: DateTime<Utc>,
) -> Result<Visitor, BarError> {
    let mut visitor = store
        .load_visitor(login)?
        .ok_or(BarError::NotFound("visitor"))?;
    visitor.decay(now);
    if !visitor.is_alive {
        debug!("{} is dead", login);
        return Err(BarError::Dead);
    }
    Ok(visitor)
}

/// Sells `drink` to `login`. Rejections before the sale write nothing; a
/// sale, fatal or not, is always written back.
pub(crate) fn purchase<S: Storage>(
    store: &mut S,
    catalog: &DrinkCatalog,
    login: &str,
    drink: &str,
    now: DateTime<Utc>,
) -> Result<Visitor, BarError> {
    let mut visitor = load_living(store, login, now)?;
    let drink = catalog.get(drink)?;
    let outcome = visitor.buy(&drink, now)?;
    store.save_visitor(&mut visitor)?;

    match outcome {
        Outcome::Served => {
            info!(
                "{} bought {}: money:{} ppm:{}",
                login, drink.name, visitor.money, visitor.ppm
            );
            Ok(visitor)
        }
        Outcome::Fatal => {
            warn!("{} died drinking {} at ppm:{}", login, drink.name, visitor.ppm);
            Err(BarError::Died)
        }
    }
}
