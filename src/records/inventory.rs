use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::Entity;
use crate::utils::dates::lenient_date;

/// Something owned and kept track of around the house.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

fn default_quantity() -> u32 {
    1
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            location: location.into(),
            quantity: default_quantity(),
            purchase_date: None,
            value: None,
        }
    }
}

impl Entity for InventoryItem {
    fn id(&self) -> &str {
        &self.id
    }
}
