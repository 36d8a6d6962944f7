use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ActivityLevel, Entry, EntryKind, MacroEstimate, MealSlot, NumericInput, PortionUnit,
    UserStats, validate_activity, validate_gender,
};

/// Why an inference call produced nothing usable. All variants are recoverable:
/// the user can simply try again.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference request failed: {0}")]
    Request(String),

    #[error("Inference service returned HTTP {0}")]
    Status(u16),

    #[error("Inference service returned an empty response")]
    EmptyResponse,

    #[error("Could not parse inference response: {0}")]
    Parse(String),

    #[error("No nutrition estimate could be made for '{0}'")]
    NoEstimate(String),
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        InferenceError::Parse(err.to_string())
    }
}

/// Turns free text into structured nutrition or profile data.
///
/// The CLI implements this with reqwest against Gemini. Called synchronously;
/// async callers should use the split `Tracker::apply_*` entry points instead.
pub trait InferenceProvider: Send + Sync {
    fn infer(&self, text: &str) -> Result<AnalysisResult, InferenceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ProfileSetup,
    FoodEntry,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub user_stats: Option<StatsPayload>,
    #[serde(default)]
    pub calculated_goal: Option<f64>,
    #[serde(default)]
    pub food_items: Option<Vec<FoodItem>>,
    #[serde(default)]
    pub advice: String,
}

impl AnalysisResult {
    #[must_use]
    pub fn items(&self) -> &[FoodItem] {
        self.food_items.as_deref().unwrap_or_default()
    }

    /// Summed nutrition of every returned item, rounded to whole units.
    #[must_use]
    pub fn estimate(&self) -> Option<MacroEstimate> {
        let items = self.items();
        if items.is_empty() {
            return None;
        }
        let mut total = MacroEstimate::default();
        for item in items {
            total.calories += item.calories.unwrap_or(0.0);
            total.protein += item.protein.unwrap_or(0.0);
            total.carbs += item.carbs.unwrap_or(0.0);
            total.fat += item.fat.unwrap_or(0.0);
        }
        Some(MacroEstimate {
            calories: total.calories.round(),
            protein: total.protein.round(),
            carbs: total.carbs.round(),
            fat: total.fat.round(),
        })
    }
}

/// Profile fields as the model reports them. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub activity_level: Option<NumericInput>,
    #[serde(default)]
    pub target_weight: Option<f64>,
    #[serde(default)]
    pub weight_loss_per_month: Option<f64>,
}

impl StatsPayload {
    /// Complete stats, or `None` when a field needed for BMR is missing.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn to_stats(&self) -> Option<UserStats> {
        let age = self.age.filter(|a| *a > 0.0)?;
        let gender = validate_gender(self.gender.as_deref()?).ok()?;
        let weight = self.weight.filter(|w| *w > 0.0)?;
        let height = self.height.filter(|h| *h > 0.0)?;
        let activity_level = match &self.activity_level {
            Some(NumericInput::Text(s)) => validate_activity(s).ok(),
            Some(n @ NumericInput::Number(_)) => Some(n.value()).filter(|v| (1.0..=2.5).contains(v)),
            None => None,
        }
        .unwrap_or_else(|| ActivityLevel::Sedentary.multiplier());

        Some(UserStats {
            age: age.round() as u32,
            gender,
            weight,
            height,
            activity_level,
            target_weight: self.target_weight,
            weight_loss_per_month: self.weight_loss_per_month,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(default)]
    pub food_name: String,
    #[serde(default)]
    pub amount_grams: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
}

impl FoodItem {
    /// Unconfirmed history entry for this item, as presented for review.
    #[must_use]
    pub fn to_candidate(&self, id: String, timestamp: i64, meal_slot: MealSlot) -> Entry {
        let rounded = |v: Option<f64>| Some(v.unwrap_or(0.0).max(0.0).round());
        Entry {
            id,
            timestamp,
            description: self.food_name.trim().to_string(),
            kind: EntryKind::FoodEntry,
            meal_slot: Some(meal_slot),
            calories: rounded(self.calories),
            protein: rounded(self.protein),
            carbs: rounded(self.carbs),
            fat: rounded(self.fat),
            amount: Some(self.amount_grams.unwrap_or(0.0).max(0.0)),
            unit: Some(PortionUnit::Gram),
        }
    }
}

/// Parse the JSON document a model returned. Tolerates a surrounding code fence.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, InferenceError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);

    if body.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    const FOOD_RESPONSE: &str = r#"{
        "action_type": "FOOD_ENTRY",
        "food_items": [
            {"food_name": "Rice", "amount_grams": 300, "calories": 390.4, "protein": 8.2, "carbs": 84.5},
            {"food_name": " Kebab ", "amount_grams": 150, "calories": 410.6, "protein": 30, "fat": 28.5}
        ],
        "advice": "I assumed 300 g of rice. Check the weight before confirming."
    }"#;

    #[test]
    fn test_parse_food_response() {
        let result = parse_analysis(FOOD_RESPONSE).unwrap();
        assert_eq!(result.action_type, ActionType::FoodEntry);
        assert_eq!(result.items().len(), 2);
        assert!(result.user_stats.is_none());
        assert!(result.advice.starts_with("I assumed"));
    }

    #[test]
    fn test_parse_tolerates_missing_fields() {
        let result = parse_analysis(r#"{"action_type": "FOOD_ENTRY"}"#).unwrap();
        assert!(result.items().is_empty());
        assert!(result.estimate().is_none());
        assert_eq!(result.advice, "");
    }

    #[test]
    fn test_parse_unknown_action() {
        let result = parse_analysis(r#"{"action_type": "SMALL_TALK", "advice": "Hi"}"#).unwrap();
        assert_eq!(result.action_type, ActionType::Unknown);
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = "```json\n{\"action_type\": \"UNKNOWN\", \"advice\": \"ok\"}\n```";
        let result = parse_analysis(fenced).unwrap();
        assert_eq!(result.advice, "ok");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_analysis("  "), Err(InferenceError::EmptyResponse)));
        assert!(matches!(parse_analysis("not json"), Err(InferenceError::Parse(_))));
    }

    #[test]
    fn test_estimate_sums_and_rounds() {
        let result = parse_analysis(FOOD_RESPONSE).unwrap();
        let estimate = result.estimate().unwrap();
        assert_eq!(estimate.calories, 801.0);
        assert_eq!(estimate.protein, 38.0);
        assert_eq!(estimate.carbs, 85.0);
        assert_eq!(estimate.fat, 29.0);
    }

    #[test]
    fn test_to_candidate_rounds_and_defaults() {
        let result = parse_analysis(FOOD_RESPONSE).unwrap();
        let entry = result.items()[1].to_candidate("42".to_string(), 1000, MealSlot::Dinner);

        assert_eq!(entry.description, "Kebab");
        assert_eq!(entry.calories, Some(411.0));
        assert_eq!(entry.carbs, Some(0.0));
        assert_eq!(entry.fat, Some(29.0));
        assert_eq!(entry.amount, Some(150.0));
        assert_eq!(entry.unit, Some(PortionUnit::Gram));
        assert_eq!(entry.meal_slot, Some(MealSlot::Dinner));
        assert_eq!(entry.kind, EntryKind::FoodEntry);
    }

    #[test]
    fn test_stats_payload_conversion() {
        let payload: StatsPayload = serde_json::from_str(
            r#"{"age": 29.6, "gender": "Female", "weight": 62, "height": 168, "activity_level": "1.55", "weight_loss_per_month": 1}"#,
        )
        .unwrap();
        let stats = payload.to_stats().unwrap();
        assert_eq!(stats.age, 30);
        assert_eq!(stats.gender, Gender::Female);
        assert_eq!(stats.activity_level, 1.55);
        assert_eq!(stats.weight_loss_per_month, Some(1.0));
    }

    #[test]
    fn test_stats_payload_incomplete() {
        let payload: StatsPayload =
            serde_json::from_str(r#"{"age": 30, "gender": "male", "weight": 80}"#).unwrap();
        assert!(payload.to_stats().is_none());

        let defaulted: StatsPayload = serde_json::from_str(
            r#"{"age": 30, "gender": "male", "weight": 80, "height": 175, "activity_level": 7}"#,
        )
        .unwrap();
        assert_eq!(defaulted.to_stats().unwrap().activity_level, 1.2);
    }
}
