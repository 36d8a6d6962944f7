use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use morsel_core::tracker::Tracker;

use super::helpers::print_entry_table;

pub(crate) fn cmd_today(tracker: &Tracker, json: bool) -> Result<()> {
    let summary = tracker.today_summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== {} ===\n", summary.date);
    if summary.entries.is_empty() {
        println!("  Nothing logged yet today\n");
    } else {
        let refs: Vec<_> = summary.entries.iter().collect();
        print_entry_table(&refs);
        println!();
    }

    let m = summary.macros;
    println!(
        "  CONSUMED:  {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        summary.consumed, m.protein, m.carbs, m.fat
    );
    match summary.goal {
        Some(goal) => {
            println!("  GOAL:      {goal:.0} kcal");
            println!("  REMAINING: {:.0} kcal", summary.remaining);
        }
        None => println!("  No profile yet. Run `morsel profile set` to get a daily goal."),
    }
    Ok(())
}

pub(crate) fn cmd_week(tracker: &Tracker, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Goal")]
        goal: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let buckets = tracker.weekly_breakdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&buckets)?);
        return Ok(());
    }

    let rows: Vec<WeekRow> = buckets
        .iter()
        .map(|b| {
            let blank = |s: String| if b.is_future { "-".to_string() } else { s };
            WeekRow {
                day: b.weekday.clone(),
                date: b.date.to_string(),
                calories: blank(format!("{:.0}", b.calories)),
                goal: format!("{:.0}", b.goal),
                protein: blank(format!("{:.0}g", b.protein)),
                carbs: blank(format!("{:.0}g", b.carbs)),
                fat: blank(format!("{:.0}g", b.fat)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
