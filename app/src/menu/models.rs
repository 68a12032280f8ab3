use serde::{Deserialize, Serialize};

use crate::error::BarError;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Drink {
    pub name: String,
    pub price: i64,
    #[serde(rename = "ppm")]
    pub ppm_cost: f64,
}

impl Drink {
    pub fn new(name: &str, price: i64, ppm_cost: f64) -> Self {
        let name = name.to_string();
        Drink {
            name,
            price,
            ppm_cost,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BarError> {
        if self.name.trim().is_empty() {
            return Err(BarError::BadRequest("drink name must not be empty".into()));
        }
        if self.price < 0 {
            return Err(BarError::BadRequest("price must not be negative".into()));
        }
        if !self.ppm_cost.is_finite() || self.ppm_cost < 0.0 {
            return Err(BarError::BadRequest(
                "ppm must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}
