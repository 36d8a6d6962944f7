use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::inference::{AnalysisResult, InferenceError, parse_analysis};

pub const SYSTEM_INSTRUCTION: &str = "\
You are a nutrition and health assistant. You maintain a calorie log and work out \
the user's daily calorie needs.

1. If the user gives physical stats (age, height, weight, gender, activity) and/or a \
weight goal (target weight, kilograms to lose per month):
   - set action_type to \"PROFILE_SETUP\" and extract the stats into user_stats;
   - compute maintenance with Mifflin-St Jeor: men 10*weight + 6.25*height - 5*age + 5, \
women 10*weight + 6.25*height - 5*age - 161, multiplied by the activity factor \
(sedentary 1.2, light 1.375, moderate 1.55, active 1.725);
   - one kilogram of body fat is about 7700 kcal, so losing X kg per month means a daily \
deficit of X*7700/30;
   - calculated_goal = maintenance - daily deficit, never below 1200.

2. If the user names foods:
   - set action_type to \"FOOD_ENTRY\" and return one food_items element per food;
   - when no quantity is given, estimate a typical portion and fill amount_grams;
   - calories and macros must match the estimated amount.

3. In advice:
   - if you estimated a quantity, say which amount you assumed and ask the user to check \
it before confirming;
   - add one short health tip.
";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

fn text_content(text: &str) -> Content {
    Content {
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "action_type": { "type": "STRING" },
            "user_stats": {
                "type": "OBJECT",
                "properties": {
                    "age": { "type": "NUMBER" },
                    "gender": { "type": "STRING" },
                    "weight": { "type": "NUMBER" },
                    "height": { "type": "NUMBER" },
                    "activity_level": { "type": "STRING" },
                    "target_weight": { "type": "NUMBER", "description": "Target body weight" },
                    "weight_loss_per_month": { "type": "NUMBER", "description": "Kilograms to lose per month" }
                }
            },
            "calculated_goal": { "type": "NUMBER" },
            "food_items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "food_name": { "type": "STRING" },
                        "amount_grams": { "type": "NUMBER" },
                        "calories": { "type": "NUMBER" },
                        "protein": { "type": "NUMBER" },
                        "carbs": { "type": "NUMBER" },
                        "fat": { "type": "NUMBER" }
                    },
                    "required": ["food_name", "amount_grams", "calories"]
                }
            },
            "advice": { "type": "STRING" }
        },
        "required": ["action_type", "advice"]
    })
}

impl GenerateContentRequest {
    #[must_use]
    pub fn analyze(user_text: &str) -> Self {
        Self {
            contents: vec![text_content(user_text)],
            system_instruction: text_content(SYSTEM_INSTRUCTION),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        }
    }
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn into_analysis(self) -> Result<AnalysisResult, InferenceError> {
        let text = self.text().ok_or(InferenceError::EmptyResponse)?;
        parse_analysis(&text)
    }
}
