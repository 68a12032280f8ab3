mod catalog;
mod models;
mod resources;

pub use self::catalog::DrinkCatalog;
pub use self::models::Drink;
pub use self::resources::{AddDrink, AffordableDrinks, Menu, ShowMenu};
