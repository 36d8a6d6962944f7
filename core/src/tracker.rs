use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, TimeZone, Timelike};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::aggregate;
use crate::inference::{
    ActionType, AnalysisResult, FoodItem, InferenceError, InferenceProvider,
};
use crate::ledger::Ledger;
use crate::models::{
    AppStatus, Entry, EntryEdit, MacroEstimate, MealSlot, NumericInput, PortionUnit, Profile,
    Progress, TodaySummary, UserStats, WeeklyBucket,
};
use crate::queue::EditSession;
use crate::store::{KeyValueStore, SqliteStore};

pub const PROFILE_KEY: &str = "profile";
pub const HISTORY_KEY: &str = "history";
pub const SESSION_KEY: &str = "review_session";
pub const ID_SEQ_KEY: &str = "id_seq";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Blank input; nothing was sent for inference.
    Ignored,
    Queued { count: usize, review: ReviewState },
    ProfileUpdated { profile: Profile },
    NoAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    Idle,
    Batch,
    Single,
}

/// What the review dialog should show right now.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewState {
    pub mode: ReviewMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub entry: Entry,
    pub inserted: bool,
    pub review: ReviewState,
}

/// A pending re-estimate for the entry that was open when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcRequest {
    pub entry_id: String,
    pub description: String,
    pub amount: f64,
    pub unit: PortionUnit,
    pub query: String,
}

/// Application state: history, profile and the review session, persisted as
/// whole blobs after every mutation.
pub struct Tracker {
    store: Box<dyn KeyValueStore>,
    ledger: Ledger,
    profile: Option<Profile>,
    session: EditSession,
    last_id: i64,
    status: AppStatus,
    last_advice: Option<String>,
}

fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stored '{key}'"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

impl Tracker {
    pub fn open(store: Box<dyn KeyValueStore>) -> Result<Self> {
        let entries: Vec<Entry> = load_json(&*store, HISTORY_KEY)?.unwrap_or_default();
        let profile: Option<Profile> = load_json(&*store, PROFILE_KEY)?;
        let session: EditSession = load_json(&*store, SESSION_KEY)?.unwrap_or_default();
        let last_id: i64 = load_json(&*store, ID_SEQ_KEY)?.unwrap_or_default();

        debug!(
            entries = entries.len(),
            has_profile = profile.is_some(),
            "loaded tracker state"
        );

        Ok(Self {
            store,
            ledger: Ledger::from_entries(entries),
            profile,
            session,
            last_id,
            status: AppStatus::Idle,
            last_advice: None,
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::open(Box::new(SqliteStore::open_in_memory()?))
    }

    // --- Persistence ---

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)?;
        debug!(key, bytes = raw.len(), "persisted");
        Ok(())
    }

    fn persist_session(&self) -> Result<()> {
        self.save(SESSION_KEY, &self.session)
    }

    // --- Read side ---

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        self.ledger.all()
    }

    /// Food entries, most recent first.
    #[must_use]
    pub fn food_history(&self, limit: Option<usize>) -> Vec<&Entry> {
        self.ledger
            .all()
            .iter()
            .filter(|e| e.is_food())
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> AppStatus {
        self.status
    }

    #[must_use]
    pub fn last_advice(&self) -> Option<&str> {
        self.last_advice.as_deref()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        self.session.current()
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.session.progress()
    }

    #[must_use]
    pub fn review_state(&self) -> ReviewState {
        let mode = match self.session {
            EditSession::Idle => ReviewMode::Idle,
            EditSession::BatchOpen { .. } => ReviewMode::Batch,
            EditSession::SingleEdit { .. } => ReviewMode::Single,
        };
        ReviewState {
            mode,
            current: self.session.current().cloned(),
            progress: self.session.progress(),
        }
    }

    #[must_use]
    pub fn today_summary(&self) -> TodaySummary {
        self.today_summary_at(&Local::now())
    }

    pub fn today_summary_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TodaySummary {
        let entries = self.ledger.all();
        let consumed = aggregate::consumed_today(entries, now);
        let tz = now.timezone();
        let date = now.date_naive();
        let todays = aggregate::food_entries_on(entries, &tz, date)
            .cloned()
            .collect();
        TodaySummary {
            date,
            consumed,
            macros: aggregate::consumed_macros_today(entries, now),
            goal: self.profile.as_ref().map(|p| p.tdee),
            remaining: aggregate::remaining(self.profile.as_ref(), consumed),
            entries: todays,
        }
    }

    #[must_use]
    pub fn weekly_breakdown(&self) -> Vec<WeeklyBucket> {
        self.weekly_breakdown_at(&Local::now())
    }

    pub fn weekly_breakdown_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<WeeklyBucket> {
        aggregate::weekly_breakdown(self.ledger.all(), self.profile.as_ref(), now)
    }

    // --- Inference ---

    /// Mark an inference request as in flight.
    pub fn mark_loading(&mut self) {
        self.status = AppStatus::Loading;
    }

    pub fn record_failure(&mut self, err: &InferenceError) {
        warn!(error = %err, "inference failed");
        self.status = AppStatus::Error;
    }

    /// Send free text for analysis and act on the result.
    pub fn submit(
        &mut self,
        provider: &dyn InferenceProvider,
        text: &str,
        meal: Option<MealSlot>,
    ) -> Result<SubmitOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }
        self.mark_loading();
        match provider.infer(text) {
            Ok(result) => self.apply_analysis(result, meal),
            Err(err) => {
                self.record_failure(&err);
                Err(err.into())
            }
        }
    }

    pub fn apply_analysis(
        &mut self,
        result: AnalysisResult,
        meal: Option<MealSlot>,
    ) -> Result<SubmitOutcome> {
        self.apply_analysis_at(result, meal, &Local::now())
    }

    pub fn apply_analysis_at<Tz: TimeZone>(
        &mut self,
        result: AnalysisResult,
        meal: Option<MealSlot>,
        now: &DateTime<Tz>,
    ) -> Result<SubmitOutcome> {
        if !result.advice.trim().is_empty() {
            self.last_advice = Some(result.advice.clone());
        }

        let outcome = match result.action_type {
            ActionType::FoodEntry if !result.items().is_empty() => {
                let slot = meal.unwrap_or_else(|| MealSlot::for_hour(now.hour()));
                let count = self.seed(result.items(), slot, now.timestamp_millis())?;
                SubmitOutcome::Queued {
                    count,
                    review: self.review_state(),
                }
            }
            ActionType::ProfileSetup => {
                let stats = result.user_stats.as_ref().and_then(|s| s.to_stats());
                match (stats, result.calculated_goal) {
                    (Some(stats), Some(goal)) => {
                        let profile = Profile::from_goal(stats, goal);
                        self.replace_profile(profile.clone())?;
                        SubmitOutcome::ProfileUpdated { profile }
                    }
                    _ => {
                        debug!("profile setup without complete stats, ignoring");
                        SubmitOutcome::NoAction
                    }
                }
            }
            _ => SubmitOutcome::NoAction,
        };

        self.status = AppStatus::Success;
        Ok(outcome)
    }

    // --- Review queue ---

    /// Fresh id derived from intake time, unique against everything seen so far.
    fn next_id(&mut self, now_ms: i64) -> String {
        let mut id = now_ms.max(self.last_id + 1);
        while self.ledger.contains(&id.to_string()) || self.session.holds(&id.to_string()) {
            id += 1;
        }
        self.last_id = id;
        id.to_string()
    }

    /// Queue a batch for review, replacing any open session. Returns the batch size;
    /// an empty batch changes nothing.
    pub fn seed(&mut self, items: &[FoodItem], slot: MealSlot, now_ms: i64) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let candidates: Vec<Entry> = items
            .iter()
            .map(|item| {
                let id = self.next_id(now_ms);
                item.to_candidate(id, now_ms, slot)
            })
            .collect();
        let count = candidates.len();
        self.session.seed(candidates);
        self.save(ID_SEQ_KEY, &self.last_id)?;
        self.persist_session()?;
        debug!(count, "seeded review queue");
        Ok(count)
    }

    /// Open a persisted entry for correction.
    pub fn open_for_edit(&mut self, id: &str) -> Result<Entry> {
        let Some(entry) = self.ledger.get(id).cloned() else {
            bail!("Entry {id} not found");
        };
        self.session.open_single(entry.clone())?;
        self.persist_session()?;
        Ok(entry)
    }

    /// Confirm the open entry with the user's corrections.
    pub fn commit(&mut self, edit: &EntryEdit) -> Result<CommitOutcome> {
        let Some(open) = self.session.current() else {
            bail!("No entry is open for review");
        };
        let entry = edit.apply(open);

        // Stage both changes and write them before touching in-memory state
        let mut ledger = self.ledger.clone();
        let inserted = ledger.upsert(entry.clone());
        let mut session = self.session.clone();
        if session.is_batch() {
            session.advance();
        } else {
            session.close();
        }

        self.save(HISTORY_KEY, ledger.all())?;
        self.save(SESSION_KEY, &session)?;
        self.ledger = ledger;
        self.session = session;
        info!(id = %entry.id, inserted, calories = entry.calories_or_zero(), "committed entry");

        Ok(CommitOutcome {
            entry,
            inserted,
            review: self.review_state(),
        })
    }

    /// Drop the batch head without saving it, or cancel a single edit.
    pub fn skip(&mut self) -> Result<ReviewState> {
        match self.session {
            EditSession::Idle => return Ok(self.review_state()),
            EditSession::BatchOpen { .. } => {
                if let Some(skipped) = self.session.advance() {
                    debug!(id = %skipped.id, "skipped queued entry");
                }
            }
            EditSession::SingleEdit { .. } => self.session.close(),
        }
        self.persist_session()?;
        Ok(self.review_state())
    }

    /// Build the re-estimate query for the open entry. Missing arguments fall
    /// back to the entry's current values.
    pub fn recalculation_request(
        &self,
        description: Option<&str>,
        amount: Option<&NumericInput>,
        unit: Option<PortionUnit>,
    ) -> Result<RecalcRequest> {
        let Some(open) = self.session.current() else {
            bail!("No entry is open for review");
        };
        let description = description
            .unwrap_or(open.description.as_str())
            .trim()
            .to_string();
        if description.is_empty() {
            bail!("Description is empty; nothing to estimate");
        }
        let amount = amount.map_or(open.amount.unwrap_or(0.0), NumericInput::value);
        let unit = unit.or(open.unit).unwrap_or(PortionUnit::Gram);
        let query = format!("{amount} {} {description}", unit.label());

        Ok(RecalcRequest {
            entry_id: open.id.clone(),
            description,
            amount,
            unit,
            query,
        })
    }

    /// Write a re-estimate into the open entry. Results for an entry that is no
    /// longer open are dropped and yield `None`.
    pub fn apply_estimate(
        &mut self,
        request: &RecalcRequest,
        result: &AnalysisResult,
    ) -> Result<Option<MacroEstimate>> {
        let Some(estimate) = result.estimate() else {
            return Err(InferenceError::NoEstimate(request.query.clone()).into());
        };
        let Some(open) = self
            .session
            .current_mut()
            .filter(|e| e.id == request.entry_id)
        else {
            warn!(id = %request.entry_id, "discarding estimate for an entry that is no longer open");
            return Ok(None);
        };

        open.description.clone_from(&request.description);
        open.amount = Some(request.amount);
        open.unit = Some(request.unit);
        open.calories = Some(estimate.calories);
        open.protein = Some(estimate.protein);
        open.carbs = Some(estimate.carbs);
        open.fat = Some(estimate.fat);
        self.persist_session()?;
        Ok(Some(estimate))
    }

    /// Re-estimate the open entry's nutrition from a new description/amount/unit.
    pub fn recalculate(
        &mut self,
        provider: &dyn InferenceProvider,
        description: Option<&str>,
        amount: Option<&NumericInput>,
        unit: Option<PortionUnit>,
    ) -> Result<MacroEstimate> {
        let request = self.recalculation_request(description, amount, unit)?;
        let result = provider.infer(&request.query).inspect_err(|err| {
            warn!(error = %err, query = %request.query, "recalculation failed");
        })?;
        match self.apply_estimate(&request, &result)? {
            Some(estimate) => Ok(estimate),
            None => bail!("The entry under review changed before the estimate arrived"),
        }
    }

    // --- Ledger & profile ---

    /// Remove an entry. Unknown ids are a no-op. A single edit of the removed
    /// entry is cancelled so a later commit cannot bring it back.
    pub fn delete_entry(&mut self, id: &str) -> Result<bool> {
        let mut ledger = self.ledger.clone();
        if !ledger.remove(id) {
            return Ok(false);
        }
        self.save(HISTORY_KEY, ledger.all())?;
        self.ledger = ledger;
        info!(id, "deleted entry");

        if matches!(&self.session, EditSession::SingleEdit { entry } if entry.id == id) {
            self.session.close();
            self.persist_session()?;
            debug!(id, "closed edit of deleted entry");
        }
        Ok(true)
    }

    /// Recompute the profile from form stats and replace the current one.
    pub fn save_profile(&mut self, stats: UserStats) -> Result<Profile> {
        let profile = Profile::from_stats(stats);
        self.replace_profile(profile.clone())?;
        self.last_advice =
            Some("Profile saved. You can start logging meals now.".to_string());
        Ok(profile)
    }

    fn replace_profile(&mut self, profile: Profile) -> Result<()> {
        info!(bmr = profile.bmr, tdee = profile.tdee, "profile replaced");
        self.save(PROFILE_KEY, &profile)?;
        self.profile = Some(profile);
        Ok(())
    }
}
