use anyhow::{Result, bail};
use std::process;

use morsel_core::models::{UserStats, validate_activity, validate_gender};
use morsel_core::tracker::Tracker;

use super::helpers::print_advice;

/// Fields for `morsel profile set`. Anything omitted keeps the saved value,
/// or the default form value when no profile exists yet.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ProfileFields {
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,
    /// male or female
    #[arg(long)]
    pub gender: Option<String>,
    /// Weight in kg
    #[arg(long)]
    pub weight: Option<f64>,
    /// Height in cm
    #[arg(long)]
    pub height: Option<f64>,
    /// sedentary, light, moderate, active, or a multiplier such as 1.4
    #[arg(long)]
    pub activity: Option<String>,
    /// Target weight in kg
    #[arg(long)]
    pub target_weight: Option<f64>,
    /// Kilograms to lose per month
    #[arg(long)]
    pub loss_per_month: Option<f64>,
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be greater than 0");
    }
    Ok(value)
}

impl ProfileFields {
    pub(crate) fn merge_into(&self, base: &UserStats) -> Result<UserStats> {
        let age = self.age.unwrap_or(base.age);
        if age == 0 {
            bail!("Age must be greater than 0");
        }
        let loss = self.loss_per_month.or(base.weight_loss_per_month);
        if loss.is_some_and(|l| !l.is_finite() || l < 0.0) {
            bail!("Loss per month cannot be negative");
        }

        Ok(UserStats {
            age,
            gender: self
                .gender
                .as_deref()
                .map_or(Ok(base.gender), validate_gender)?,
            weight: positive("Weight", self.weight.unwrap_or(base.weight))?,
            height: positive("Height", self.height.unwrap_or(base.height))?,
            activity_level: self
                .activity
                .as_deref()
                .map_or(Ok(base.activity_level), validate_activity)?,
            target_weight: self
                .target_weight
                .map(|w| positive("Target weight", w))
                .transpose()?
                .or(base.target_weight),
            weight_loss_per_month: loss,
        })
    }
}

pub(crate) fn cmd_profile_set(tracker: &mut Tracker, fields: &ProfileFields, json: bool) -> Result<()> {
    let base = tracker
        .profile()
        .map(|p| p.stats.clone())
        .unwrap_or_default();
    let stats = fields.merge_into(&base)?;
    let profile = tracker.save_profile(stats)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("BMR:        {:.0} kcal", profile.bmr);
    println!("Daily goal: {:.0} kcal", profile.tdee);
    print_advice(tracker.last_advice());
    Ok(())
}

pub(crate) fn cmd_profile_show(tracker: &Tracker, json: bool) -> Result<()> {
    let Some(profile) = tracker.profile() else {
        if json {
            println!("null");
        } else {
            eprintln!("No profile set. Run `morsel profile set`.");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    let s = &profile.stats;
    println!("Age:        {}", s.age);
    println!("Gender:     {:?}", s.gender);
    println!("Weight:     {} kg", s.weight);
    println!("Height:     {} cm", s.height);
    println!("Activity:   x{}", s.activity_level);
    if let Some(target) = s.target_weight {
        println!("Target:     {target} kg");
    }
    if let Some(loss) = s.weight_loss_per_month {
        println!("Loss/month: {loss} kg");
    }
    println!("BMR:        {:.0} kcal", profile.bmr);
    println!("Daily goal: {:.0} kcal", profile.tdee);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use morsel_core::models::{Gender, Profile};

    #[test]
    fn test_merge_defaults_match_example() {
        let stats = ProfileFields::default()
            .merge_into(&UserStats::default())
            .unwrap();
        assert_eq!(Profile::from_stats(stats).tdee, 1847.0);
    }

    #[test]
    fn test_merge_overrides() {
        let fields = ProfileFields {
            gender: Some("female".to_string()),
            activity: Some("active".to_string()),
            weight: Some(65.0),
            ..ProfileFields::default()
        };
        let stats = fields.merge_into(&UserStats::default()).unwrap();
        assert_eq!(stats.gender, Gender::Female);
        assert_eq!(stats.activity_level, 1.725);
        assert_eq!(stats.weight, 65.0);
        assert_eq!(stats.height, 175.0);
    }

    #[test]
    fn test_merge_rejects_bad_values() {
        let base = UserStats::default();
        let zero_age = ProfileFields {
            age: Some(0),
            ..ProfileFields::default()
        };
        assert!(zero_age.merge_into(&base).is_err());

        let negative_loss = ProfileFields {
            loss_per_month: Some(-1.0),
            ..ProfileFields::default()
        };
        assert!(negative_loss.merge_into(&base).is_err());

        let bad_gender = ProfileFields {
            gender: Some("x".to_string()),
            ..ProfileFields::default()
        };
        assert!(bad_gender.merge_into(&base).is_err());
    }
}
