use anyhow::Result;
use std::process;

use morsel_core::inference::InferenceProvider;
use morsel_core::models::{EntryEdit, NumericInput};
use morsel_core::tracker::{SubmitOutcome, Tracker};

use super::helpers::{json_error, parse_meal, parse_unit, print_advice, print_review};

/// Corrections accepted by `morsel confirm`. Numbers are taken as typed;
/// anything unparseable is stored as 0.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct EditFields {
    /// Food description
    #[arg(long)]
    pub name: Option<String>,
    /// Meal: breakfast, lunch, dinner, snack
    #[arg(long)]
    pub meal: Option<String>,
    /// Portion amount
    #[arg(long)]
    pub amount: Option<String>,
    /// Portion unit (gram, tablespoon, ladle, glass, palm, count, slice, plate, skewer)
    #[arg(long)]
    pub unit: Option<String>,
    /// Calories (kcal)
    #[arg(long)]
    pub calories: Option<String>,
    /// Protein (g)
    #[arg(long)]
    pub protein: Option<String>,
    /// Carbohydrates (g)
    #[arg(long)]
    pub carbs: Option<String>,
    /// Fat (g)
    #[arg(long)]
    pub fat: Option<String>,
}

impl EditFields {
    pub(crate) fn to_edit(&self) -> Result<EntryEdit> {
        let numeric = |v: &Option<String>| v.as_deref().map(NumericInput::from);
        Ok(EntryEdit {
            description: self
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            meal_slot: parse_meal(self.meal.as_deref())?,
            amount: numeric(&self.amount),
            unit: parse_unit(self.unit.as_deref())?,
            calories: numeric(&self.calories),
            protein: numeric(&self.protein),
            carbs: numeric(&self.carbs),
            fat: numeric(&self.fat),
        })
    }
}

pub(crate) fn cmd_add(
    tracker: &mut Tracker,
    provider: &dyn InferenceProvider,
    text: &str,
    meal: Option<&str>,
    json: bool,
) -> Result<()> {
    let meal = parse_meal(meal)?;
    let outcome = tracker.submit(provider, text, meal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        SubmitOutcome::Ignored => eprintln!("Nothing to analyze"),
        SubmitOutcome::Queued { count, review } => {
            let plural = if *count == 1 { "" } else { "s" };
            println!("Found {count} item{plural} to review\n");
            print_review(review);
        }
        SubmitOutcome::ProfileUpdated { profile } => {
            println!(
                "Profile updated: daily goal {:.0} kcal (BMR {:.0})",
                profile.tdee, profile.bmr
            );
        }
        SubmitOutcome::NoAction => println!("No food or profile details recognised"),
    }
    print_advice(tracker.last_advice());
    Ok(())
}

pub(crate) fn cmd_pending(tracker: &Tracker, json: bool) -> Result<()> {
    let state = tracker.review_state();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_review(&state);
    }
    Ok(())
}

pub(crate) fn cmd_confirm(tracker: &mut Tracker, fields: &EditFields, json: bool) -> Result<()> {
    let edit = fields.to_edit()?;
    let outcome = tracker.commit(&edit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let verb = if outcome.inserted { "Saved" } else { "Updated" };
    println!(
        "{verb} {} ({:.0} kcal) [{}]",
        outcome.entry.description,
        outcome.entry.calories_or_zero(),
        outcome.entry.id
    );
    if outcome.review.current.is_some() {
        println!();
        print_review(&outcome.review);
    }
    Ok(())
}

pub(crate) fn cmd_skip(tracker: &mut Tracker, json: bool) -> Result<()> {
    let state = tracker.skip()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_review(&state);
    }
    Ok(())
}

pub(crate) fn cmd_edit(tracker: &mut Tracker, id: &str, json: bool) -> Result<()> {
    if tracker.entries().iter().all(|e| e.id != id) {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }

    tracker.open_for_edit(id)?;
    let state = tracker.review_state();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_review(&state);
    }
    Ok(())
}

pub(crate) fn cmd_recalc(
    tracker: &mut Tracker,
    provider: &dyn InferenceProvider,
    name: Option<&str>,
    amount: Option<&str>,
    unit: Option<&str>,
    json: bool,
) -> Result<()> {
    let unit = parse_unit(unit)?;
    let amount = amount.map(NumericInput::from);
    let estimate = tracker.recalculate(provider, name, amount.as_ref(), unit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    println!(
        "New estimate: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g\n",
        estimate.calories, estimate.protein, estimate.carbs, estimate.fat
    );
    print_review(&tracker.review_state());
    Ok(())
}
