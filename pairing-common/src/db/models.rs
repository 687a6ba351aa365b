//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Dish classification stored in `dishes.dish_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DishType {
    Main,
    Side,
    Dessert,
    Appetizer,
    Beverage,
}

impl DishType {
    pub const ALL: [DishType; 5] = [
        DishType::Main,
        DishType::Side,
        DishType::Dessert,
        DishType::Appetizer,
        DishType::Beverage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DishType::Main => "main",
            DishType::Side => "side",
            DishType::Dessert => "dessert",
            DishType::Appetizer => "appetizer",
            DishType::Beverage => "beverage",
        }
    }
}

impl fmt::Display for DishType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DishType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DishType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Invalid dish type '{}' (expected main, side, dessert, appetizer or beverage)",
                    s
                ))
            })
    }
}

/// Recipe difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(Error::InvalidInput(format!(
                "Invalid difficulty '{}' (expected easy, medium or hard)",
                other
            ))),
        }
    }
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub cuisine: Option<String>,
    pub dish_type: DishType,
    pub dietary_tags: Vec<String>,
    pub keywords: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nutrition facts keyed by nutrient name
pub type Nutrition = BTreeMap<String, serde_json::Value>;

/// Recipe owned by exactly one dish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub dish_id: i64,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub nutrition: Option<Nutrition>,
    pub source_url: Option<String>,
}

/// Dish together with its optional recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishDetail {
    #[serde(flatten)]
    pub dish: Dish,
    pub recipe: Option<Recipe>,
}

/// Side dish as it appears in a main dish's pairing list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedSide {
    #[serde(flatten)]
    pub dish: Dish,
    pub match_score: f64,
    pub order_position: i64,
    pub recipe: Option<Recipe>,
}

/// Main dish with its ordered side dishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishPairings {
    pub main_dish: Dish,
    pub side_dishes: Vec<PairedSide>,
}

/// View counter for a dish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityRecord {
    pub dish_id: i64,
    pub view_count: i64,
    pub last_viewed: DateTime<Utc>,
}

/// Dish with its popularity counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularDish {
    #[serde(flatten)]
    pub dish: Dish,
    pub view_count: i64,
    pub last_viewed: DateTime<Utc>,
}

/// Dish fields accepted by the upsert path (id and timestamps are store-managed)
#[derive(Debug, Clone, PartialEq)]
pub struct NewDish {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub cuisine: Option<String>,
    pub dish_type: DishType,
    pub dietary_tags: Vec<String>,
    pub keywords: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

/// Recipe fields accepted by the upsert path; the owning dish id is supplied separately
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewRecipe {
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub nutrition: Option<Nutrition>,
    pub source_url: Option<String>,
}
