use anyhow::Result;
use chrono::{Local, TimeZone};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use morsel_core::models::{
    Entry, MealSlot, PortionUnit, meal_label, validate_meal_slot, validate_unit,
};
use morsel_core::tracker::{ReviewMode, ReviewState};

pub(crate) fn parse_meal(meal: Option<&str>) -> Result<Option<MealSlot>> {
    meal.map(validate_meal_slot).transpose()
}

pub(crate) fn parse_unit(unit: Option<&str>) -> Result<Option<PortionUnit>> {
    unit.map(validate_unit).transpose()
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// "300 gram", "1.5 slice", or "-" when no portion was recorded.
pub(crate) fn format_portion(entry: &Entry) -> String {
    match (entry.amount, entry.unit) {
        (Some(amount), Some(unit)) if amount.fract() == 0.0 => {
            format!("{amount:.0} {}", unit.label())
        }
        (Some(amount), Some(unit)) => format!("{amount} {}", unit.label()),
        (Some(amount), None) => format!("{amount}"),
        _ => "-".to_string(),
    }
}

pub(crate) fn format_time(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| "?".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn print_entry_table(entries: &[&Entry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Logged")]
        logged: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Portion")]
        portion: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| {
            let macros = e.macros();
            EntryRow {
                id: e.id.clone(),
                logged: format_time(e.timestamp),
                meal: meal_label(e.meal_slot).to_string(),
                food: truncate(&e.description, 30),
                portion: format_portion(e),
                calories: format!("{:.0}", e.calories_or_zero()),
                protein: format!("{:.0}g", macros.protein),
                carbs: format!("{:.0}g", macros.carbs),
                fat: format!("{:.0}g", macros.fat),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(5..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Human-readable view of the entry currently under review.
pub(crate) fn print_review(state: &ReviewState) {
    let Some(entry) = &state.current else {
        println!("Nothing to review");
        return;
    };

    match (state.mode, state.progress) {
        (ReviewMode::Batch, Some(p)) => println!("Reviewing item {} of {}", p.position, p.total),
        _ => println!("Editing entry {}", entry.id),
    }

    let macros = entry.macros();
    println!("  Food:     {}", entry.description);
    println!("  Meal:     {}", meal_label(entry.meal_slot));
    println!("  Portion:  {}", format_portion(entry));
    println!(
        "  Calories: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        entry.calories_or_zero(),
        macros.protein,
        macros.carbs,
        macros.fat
    );
    println!("\nUse `morsel confirm` to save (with --calories etc. to correct), or `morsel skip`.");
}

pub(crate) fn print_advice(advice: Option<&str>) {
    if let Some(advice) = advice.filter(|a| !a.trim().is_empty()) {
        println!("\n{advice}");
    }
}
