//! Typed model responses.
//!
//! Model output is decoded into these types on receipt. Decoding failures
//! and structural violations (such as a wrong number of itinerary days)
//! surface as `SchemaMismatch` and are never cached.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ItineraError, Result};

/// Budget class extracted from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Cheap,
    Mid,
    Luxury,
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Mid => "mid",
            Self::Luxury => "luxury",
        }
    }
}

/// Trip fields extracted from a free-text prompt. Unknown fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExtraction {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub budget_type: Option<BudgetType>,
    pub members: Option<u32>,
    pub days: Option<u32>,
    pub original_prompt: String,
}

/// A cost the model wrote either as text ("BDT 1,200") or as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cost {
    Amount(f64),
    Text(String),
}

impl Default for Cost {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Envelope of a generated itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlanResponse {
    #[serde(default)]
    pub success: bool,
    pub plan: TripPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    #[serde(default)]
    pub trip_name: String,
    #[serde(default)]
    pub total_members: u32,
    #[serde(default)]
    pub budget: String,
    pub origin: String,
    pub destination: String,
    pub days: u32,
    #[serde(default)]
    pub prompt: TravelPreferences,
    #[serde(default)]
    pub transportation: Transportation,
    #[serde(default)]
    pub accommodation: Vec<Accommodation>,
    pub daily_itinerary: Vec<DayPlan>,
    #[serde(default)]
    pub food: Food,
    #[serde(default)]
    pub budget_breakdown: BudgetBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelPreferences {
    pub transport: String,
    pub pace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transportation {
    pub mode: String,
    pub details: String,
    pub estimated_cost: Cost,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Accommodation {
    pub hotel_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub estimated_cost_per_night: Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// One itinerary entry: plain text, or whatever structure the model chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Activity {
    Text(String),
    Detailed(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Food {
    pub famous_local_dishes: Vec<String>,
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostItem {
    pub description: String,
    #[serde(rename = "estimatedCost")]
    pub estimated_cost: Cost,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BudgetBreakdown {
    pub transportation: CostItem,
    pub accommodation: CostItem,
    pub local_transportation: CostItem,
    pub food_and_beverages: CostItem,
    pub activities_and_entry_fees: CostItem,
    pub total_estimated_cost: Cost,
    pub notes: String,
}

impl TripPlanResponse {
    /// Require exactly `days` itinerary entries numbered `1..=days` in order.
    pub fn validate(&self, days: u32) -> Result<()> {
        let itinerary = &self.plan.daily_itinerary;
        if itinerary.len() != days as usize {
            return Err(ItineraError::SchemaMismatch(format!(
                "expected {days} itinerary days, got {}",
                itinerary.len()
            )));
        }
        for (expected, entry) in (1..=days).zip(itinerary) {
            if entry.day != expected {
                return Err(ItineraError::SchemaMismatch(format!(
                    "itinerary day {} found where day {expected} was expected",
                    entry.day
                )));
            }
        }
        Ok(())
    }
}

/// Output schema for field extraction, in Gemini's `responseSchema` dialect.
pub fn field_extraction_schema() -> serde_json::Value {
    let nullable = |kind: &str| json!({"type": kind, "nullable": true});
    json!({
        "type": "OBJECT",
        "properties": {
            "origin": nullable("STRING"),
            "destination": nullable("STRING"),
            "budgetType": {
                "type": "STRING",
                "enum": ["cheap", "mid", "luxury"],
                "nullable": true
            },
            "members": nullable("INTEGER"),
            "days": nullable("INTEGER"),
            "originalPrompt": {"type": "STRING"}
        },
        "required": ["origin", "destination", "budgetType", "members", "days", "originalPrompt"]
    })
}

/// Output schema for a generated itinerary.
///
/// Costs are asked for as text; [`Cost`] also accepts numbers.
pub fn trip_plan_schema() -> serde_json::Value {
    let text = || json!({"type": "STRING"});
    let cost_item = || {
        json!({
            "type": "OBJECT",
            "properties": {"description": text(), "estimatedCost": text()}
        })
    };
    json!({
        "type": "OBJECT",
        "properties": {
            "success": {"type": "BOOLEAN"},
            "plan": {
                "type": "OBJECT",
                "properties": {
                    "tripName": text(),
                    "totalMembers": {"type": "INTEGER"},
                    "budget": text(),
                    "origin": text(),
                    "destination": text(),
                    "days": {"type": "INTEGER"},
                    "prompt": {
                        "type": "OBJECT",
                        "properties": {"transport": text(), "pace": text()}
                    },
                    "transportation": {
                        "type": "OBJECT",
                        "properties": {
                            "mode": text(),
                            "details": text(),
                            "estimatedCost": text()
                        }
                    },
                    "accommodation": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "hotelName": text(),
                                "type": text(),
                                "description": text(),
                                "estimatedCostPerNight": text()
                            }
                        }
                    },
                    "dailyItinerary": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "day": {"type": "INTEGER"},
                                "activities": {"type": "ARRAY", "items": text()}
                            },
                            "required": ["day", "activities"]
                        }
                    },
                    "food": {
                        "type": "OBJECT",
                        "properties": {
                            "famousLocalDishes": {"type": "ARRAY", "items": text()},
                            "recommendations": text()
                        }
                    },
                    "budgetBreakdown": {
                        "type": "OBJECT",
                        "properties": {
                            "transportation": cost_item(),
                            "accommodation": cost_item(),
                            "localTransportation": cost_item(),
                            "foodAndBeverages": cost_item(),
                            "activitiesAndEntryFees": cost_item(),
                            "totalEstimatedCost": text(),
                            "notes": text()
                        }
                    }
                },
                "required": ["origin", "destination", "days", "dailyItinerary"]
            }
        },
        "required": ["success", "plan"]
    })
}

/// Decode a model document into `T`, reporting failures as `SchemaMismatch`.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ItineraError::SchemaMismatch(e.to_string()))
}
