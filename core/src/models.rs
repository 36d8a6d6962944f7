use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lowest daily goal the profile math will ever produce.
pub const MIN_DAILY_GOAL: f64 = 1200.0;

/// Goal shown for weekly buckets before any profile exists.
pub const DEFAULT_DAILY_GOAL: f64 = 2000.0;

/// Energy stored in one kilogram of body fat.
pub const KCAL_PER_KG_FAT: f64 = 7700.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    FoodEntry,
    ProfileSetup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    /// Slot suggested for a new entry logged at `hour` (0-23, local time).
    #[must_use]
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            5..=10 => MealSlot::Breakfast,
            11..=15 => MealSlot::Lunch,
            16..=22 => MealSlot::Dinner,
            _ => MealSlot::Snack,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

#[must_use]
pub fn meal_label(slot: Option<MealSlot>) -> &'static str {
    slot.map_or("unspecified", MealSlot::label)
}

pub fn validate_meal_slot(meal: &str) -> Result<MealSlot> {
    let lower = meal.trim().to_lowercase();
    match MealSlot::ALL.iter().find(|m| m.label() == lower) {
        Some(slot) => Ok(*slot),
        None => bail!("Invalid meal '{meal}'. Must be one of: breakfast, lunch, dinner, snack"),
    }
}

/// Portion units offered when correcting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortionUnit {
    Gram,
    Tablespoon,
    Ladle,
    Glass,
    Palm,
    Count,
    Slice,
    Plate,
    Skewer,
}

impl PortionUnit {
    pub const ALL: [PortionUnit; 9] = [
        PortionUnit::Gram,
        PortionUnit::Tablespoon,
        PortionUnit::Ladle,
        PortionUnit::Glass,
        PortionUnit::Palm,
        PortionUnit::Count,
        PortionUnit::Slice,
        PortionUnit::Plate,
        PortionUnit::Skewer,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PortionUnit::Gram => "gram",
            PortionUnit::Tablespoon => "tablespoon",
            PortionUnit::Ladle => "ladle",
            PortionUnit::Glass => "glass",
            PortionUnit::Palm => "palm",
            PortionUnit::Count => "count",
            PortionUnit::Slice => "slice",
            PortionUnit::Plate => "plate",
            PortionUnit::Skewer => "skewer",
        }
    }
}

pub fn validate_unit(unit: &str) -> Result<PortionUnit> {
    let lower = unit.trim().to_lowercase();
    let lower = match lower.as_str() {
        "g" | "grams" => "gram",
        "tbsp" => "tablespoon",
        other => other,
    };
    match PortionUnit::ALL.iter().find(|u| u.label() == lower) {
        Some(u) => Ok(*u),
        None => {
            let supported: Vec<&str> = PortionUnit::ALL.iter().map(|u| u.label()).collect();
            bail!("Unknown unit '{unit}'. Supported: {}", supported.join(", "))
        }
    }
}

/// Parse a user-typed number, falling back to 0 for anything that is not a
/// finite non-negative value.
#[must_use]
pub fn parse_or_zero(s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// A numeric field as it arrives from a form: either already a number or raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            NumericInput::Number(v) if v.is_finite() && *v > 0.0 => *v,
            NumericInput::Number(_) => 0.0,
            NumericInput::Text(s) => parse_or_zero(s),
        }
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

/// One record in the nutrition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub description: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_slot: Option<MealSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<PortionUnit>,
}

impl Entry {
    #[must_use]
    pub fn is_food(&self) -> bool {
        self.kind == EntryKind::FoodEntry
    }

    #[must_use]
    pub fn calories_or_zero(&self) -> f64 {
        self.calories.unwrap_or(0.0)
    }

    #[must_use]
    pub fn macros(&self) -> Macros {
        Macros {
            protein: self.protein.unwrap_or(0.0),
            carbs: self.carbs.unwrap_or(0.0),
            fat: self.fat.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Macros {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl std::ops::AddAssign for Macros {
    fn add_assign(&mut self, rhs: Self) {
        self.protein += rhs.protein;
        self.carbs += rhs.carbs;
        self.fat += rhs.fat;
    }
}

/// Freshly estimated nutrition for an entry under correction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroEstimate {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// User corrections to the open entry. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryEdit {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meal_slot: Option<MealSlot>,
    #[serde(default)]
    pub amount: Option<NumericInput>,
    #[serde(default)]
    pub unit: Option<PortionUnit>,
    #[serde(default)]
    pub calories: Option<NumericInput>,
    #[serde(default)]
    pub protein: Option<NumericInput>,
    #[serde(default)]
    pub carbs: Option<NumericInput>,
    #[serde(default)]
    pub fat: Option<NumericInput>,
}

impl EntryEdit {
    /// Produce the committed version of `entry`. Identity and timestamp are kept.
    #[must_use]
    pub fn apply(&self, entry: &Entry) -> Entry {
        let pick = |field: &Option<NumericInput>, current: Option<f64>| {
            Some(field.as_ref().map_or(current.unwrap_or(0.0), NumericInput::value))
        };
        Entry {
            id: entry.id.clone(),
            timestamp: entry.timestamp,
            kind: entry.kind,
            description: self
                .description
                .clone()
                .unwrap_or_else(|| entry.description.clone()),
            meal_slot: self.meal_slot.or(entry.meal_slot),
            calories: pick(&self.calories, entry.calories),
            protein: pick(&self.protein, entry.protein),
            carbs: pick(&self.carbs, entry.carbs),
            fat: pick(&self.fat, entry.fat),
            amount: pick(&self.amount, entry.amount),
            unit: self.unit.or(entry.unit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

pub fn validate_gender(gender: &str) -> Result<Gender> {
    match gender.trim().to_lowercase().as_str() {
        "male" | "m" => Ok(Gender::Male),
        "female" | "f" => Ok(Gender::Female),
        _ => bail!("Invalid gender '{gender}'. Must be male or female"),
    }
}

/// Preset activity multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
}

impl ActivityLevel {
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
        }
    }
}

/// Accepts a preset name or a raw multiplier such as "1.55".
pub fn validate_activity(activity: &str) -> Result<f64> {
    let level = match activity.trim().to_lowercase().as_str() {
        "sedentary" => Some(ActivityLevel::Sedentary),
        "light" => Some(ActivityLevel::Light),
        "moderate" => Some(ActivityLevel::Moderate),
        "active" => Some(ActivityLevel::Active),
        _ => None,
    };
    if let Some(level) = level {
        return Ok(level.multiplier());
    }
    let value = parse_or_zero(activity);
    if !(1.0..=2.5).contains(&value) {
        bail!(
            "Invalid activity '{activity}'. Use sedentary, light, moderate, active or a multiplier between 1.0 and 2.5"
        );
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub age: u32,
    pub gender: Gender,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
    /// Multiplier applied to BMR.
    pub activity_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_loss_per_month: Option<f64>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            age: 30,
            gender: Gender::Male,
            weight: 80.0,
            height: 175.0,
            activity_level: ActivityLevel::Light.multiplier(),
            target_weight: None,
            weight_loss_per_month: Some(2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub stats: UserStats,
    pub bmr: f64,
    /// Daily calorie goal.
    pub tdee: f64,
}

impl Profile {
    /// Mifflin-St Jeor basal metabolic rate.
    #[must_use]
    pub fn bmr_for(stats: &UserStats) -> f64 {
        let base = 10.0 * stats.weight + 6.25 * stats.height - 5.0 * f64::from(stats.age);
        match stats.gender {
            Gender::Male => base + 5.0,
            Gender::Female => base - 161.0,
        }
    }

    #[must_use]
    pub fn from_stats(stats: UserStats) -> Self {
        let bmr = Self::bmr_for(&stats);
        let maintenance = bmr * stats.activity_level;
        let loss = stats.weight_loss_per_month.unwrap_or(0.0);
        let deficit = loss * KCAL_PER_KG_FAT / 30.0;
        let tdee = (maintenance - deficit).round().max(MIN_DAILY_GOAL);
        Self {
            bmr: bmr.round(),
            tdee,
            stats,
        }
    }

    /// Profile whose goal was computed elsewhere. The floor still applies.
    #[must_use]
    pub fn from_goal(stats: UserStats, goal: f64) -> Self {
        let bmr = Self::bmr_for(&stats).round();
        Self {
            stats,
            bmr,
            tdee: goal.round().max(MIN_DAILY_GOAL),
        }
    }
}

/// Status of the most recent inference request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub consumed: f64,
    pub macros: Macros,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
    pub remaining: f64,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBucket {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Sat".
    pub weekday: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub goal: f64,
    pub is_future: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> Entry {
        Entry {
            id: "1700000000000".to_string(),
            timestamp: 1_700_000_000_000,
            description: "Rice".to_string(),
            kind: EntryKind::FoodEntry,
            meal_slot: Some(MealSlot::Lunch),
            calories: Some(390.0),
            protein: Some(8.0),
            carbs: Some(84.0),
            fat: Some(1.0),
            amount: Some(300.0),
            unit: Some(PortionUnit::Gram),
        }
    }

    #[test]
    fn test_parse_or_zero() {
        assert_eq!(parse_or_zero("250"), 250.0);
        assert_eq!(parse_or_zero(" 12.5 "), 12.5);
        assert_eq!(parse_or_zero(""), 0.0);
        assert_eq!(parse_or_zero("abc"), 0.0);
        assert_eq!(parse_or_zero("-40"), 0.0);
        assert_eq!(parse_or_zero("NaN"), 0.0);
        assert_eq!(parse_or_zero("inf"), 0.0);
    }

    #[test]
    fn test_numeric_input_value() {
        assert_eq!(NumericInput::from(42.0).value(), 42.0);
        assert_eq!(NumericInput::from(-1.0).value(), 0.0);
        assert_eq!(NumericInput::from("17").value(), 17.0);
        assert_eq!(NumericInput::from("seventeen").value(), 0.0);

        let parsed: Vec<NumericInput> = serde_json::from_str(r#"[5, "6", "x"]"#).unwrap();
        let values: Vec<f64> = parsed.iter().map(NumericInput::value).collect();
        assert_eq!(values, vec![5.0, 6.0, 0.0]);
    }

    #[test]
    fn test_meal_slot_for_hour() {
        assert_eq!(MealSlot::for_hour(4), MealSlot::Snack);
        assert_eq!(MealSlot::for_hour(5), MealSlot::Breakfast);
        assert_eq!(MealSlot::for_hour(10), MealSlot::Breakfast);
        assert_eq!(MealSlot::for_hour(11), MealSlot::Lunch);
        assert_eq!(MealSlot::for_hour(16), MealSlot::Dinner);
        assert_eq!(MealSlot::for_hour(22), MealSlot::Dinner);
        assert_eq!(MealSlot::for_hour(23), MealSlot::Snack);
    }

    #[test]
    fn test_validate_meal_slot() {
        assert_eq!(validate_meal_slot("Lunch").unwrap(), MealSlot::Lunch);
        assert!(validate_meal_slot("brunch").is_err());
        assert_eq!(meal_label(None), "unspecified");
    }

    #[test]
    fn test_validate_unit() {
        assert_eq!(validate_unit("g").unwrap(), PortionUnit::Gram);
        assert_eq!(validate_unit("Skewer").unwrap(), PortionUnit::Skewer);
        let err = validate_unit("bucket").unwrap_err().to_string();
        assert!(err.contains("Supported: gram"));
    }

    #[test]
    fn test_validate_activity() {
        assert_eq!(validate_activity("moderate").unwrap(), 1.55);
        assert_eq!(validate_activity("1.375").unwrap(), 1.375);
        assert!(validate_activity("9").is_err());
        assert!(validate_activity("lazy").is_err());
    }

    #[test]
    fn test_profile_from_stats_example() {
        let stats = UserStats {
            age: 30,
            gender: Gender::Male,
            weight: 80.0,
            height: 175.0,
            activity_level: 1.375,
            target_weight: None,
            weight_loss_per_month: Some(2.0),
        };
        assert!((Profile::bmr_for(&stats) - 1716.75).abs() < 1e-9);

        let profile = Profile::from_stats(stats);
        assert_eq!(profile.bmr, 1717.0);
        assert_eq!(profile.tdee, 1847.0);
    }

    #[test]
    fn test_profile_female_and_no_loss_target() {
        let stats = UserStats {
            age: 40,
            gender: Gender::Female,
            weight: 60.0,
            height: 165.0,
            activity_level: 1.2,
            target_weight: None,
            weight_loss_per_month: None,
        };
        // 600 + 1031.25 - 200 - 161 = 1270.25, * 1.2 = 1524.3
        let profile = Profile::from_stats(stats);
        assert_eq!(profile.bmr, 1270.0);
        assert_eq!(profile.tdee, 1524.0);
    }

    #[test]
    fn test_profile_goal_is_clamped() {
        let stats = UserStats {
            weight_loss_per_month: Some(6.0),
            activity_level: 1.2,
            ..UserStats::default()
        };
        let profile = Profile::from_stats(stats.clone());
        assert_eq!(profile.tdee, MIN_DAILY_GOAL);

        let from_goal = Profile::from_goal(stats, 950.0);
        assert_eq!(from_goal.tdee, MIN_DAILY_GOAL);
    }

    #[test]
    fn test_entry_edit_keeps_identity() {
        let entry = sample_entry();
        let edit = EntryEdit {
            description: Some("Brown rice".to_string()),
            calories: Some("oops".into()),
            protein: Some("9".into()),
            ..EntryEdit::default()
        };
        let edited = edit.apply(&entry);

        assert_eq!(edited.id, entry.id);
        assert_eq!(edited.timestamp, entry.timestamp);
        assert_eq!(edited.description, "Brown rice");
        assert_eq!(edited.calories, Some(0.0));
        assert_eq!(edited.protein, Some(9.0));
        assert_eq!(edited.carbs, Some(84.0));
        assert_eq!(edited.meal_slot, Some(MealSlot::Lunch));
    }

    #[test]
    fn test_entry_serde_names() {
        let json = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(json["kind"], "FOOD_ENTRY");
        assert_eq!(json["meal_slot"], "LUNCH");
        assert_eq!(json["unit"], "gram");

        // Missing macros load as absent and count as zero
        let bare: Entry = serde_json::from_str(
            r#"{"id":"1","timestamp":0,"description":"Tea","kind":"FOOD_ENTRY"}"#,
        )
        .unwrap();
        assert_eq!(bare.calories_or_zero(), 0.0);
        assert_eq!(bare.macros(), Macros::default());
    }
}
