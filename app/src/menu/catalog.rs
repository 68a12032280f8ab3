use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::*;

use super::models::Drink;
use crate::error::BarError;

/// The drinks on offer, keyed by name.
///
/// Reads take a shared lock. Appends are additionally serialized by
/// `appends`, which is held across the existence check, the store write and
/// the insert, so two requests adding the same name cannot both succeed and
/// the map never holds a drink the store has not accepted.
#[derive(Debug, Default)]
pub struct DrinkCatalog {
    drinks: RwLock<HashMap<String, Drink>>,
    appends: Mutex<()>,
}

impl DrinkCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole catalog.
    pub fn load<I: IntoIterator<Item = Drink>>(&self, records: I) {
        let map = records
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect::<HashMap<_, _>>();
        let _append = self.appends.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Loaded {} drinks", map.len());
        *self.write() = map;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Drink, BarError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or(BarError::NotFound("drink"))
    }

    /// Adds `drink`, running `persist` first. Nothing is inserted if the
    /// name is taken or `persist` fails.
    pub fn add<F>(&self, drink: Drink, persist: F) -> Result<(), BarError>
    where
        F: FnOnce(&Drink) -> Result<(), BarError>,
    {
        let _append = self.appends.lock().unwrap_or_else(PoisonError::into_inner);
        if self.contains(&drink.name) {
            return Err(BarError::AlreadyExists(drink.name));
        }
        persist(&drink)?;
        info!("Added drink: {:?}", drink);
        self.write().insert(drink.name.clone(), drink);
        Ok(())
    }

    pub fn list(&self) -> Vec<Drink> {
        self.read().values().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Drink> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Drink>> {
        // Every write is a single insert or swap, so a poisoned map is still whole.
        self.drinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Drink>> {
        self.drinks.write().unwrap_or_else(PoisonError::into_inner)
    }
}
