use anyhow::Result;
use std::process;

use morsel_core::tracker::Tracker;

use super::helpers::{json_error, print_entry_table};

pub(crate) fn cmd_delete(tracker: &mut Tracker, id: &str, json: bool) -> Result<()> {
    if tracker.delete_entry(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted entry {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_history(tracker: &Tracker, limit: Option<usize>, json: bool) -> Result<()> {
    let entries = tracker.food_history(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries yet");
        process::exit(2);
    }

    print_entry_table(&entries);
    Ok(())
}
