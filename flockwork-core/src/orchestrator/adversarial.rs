//! AdversarialCoordinator (C9): the implementer/reviewer cycle driver.
//!
//! Independent of the ultra-plan `Coordinator` (§1): it iterates a single
//! shared worktree through rounds of `{Implementing, Reviewing}`, with
//! sentinel-file handshakes standing in for a return channel from the
//! worker process (§4.10). Score enforcement, stuck detection, and
//! sub-group rotation all live here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::plan::Task;
use crate::session::{
    AdversarialPhase, AdversarialSession, IncrementFile, IncrementStatus, ReviewFile, Role, Round,
    SessionStore,
};
use crate::{Error, Result};

use super::checkout::Checkout;
use super::events::{Event, EventBus};
use super::worker_pool::{WorkerPool, WorkerView};

/// Written by the implementer when it believes a round's increment is
/// ready for review (or has given up).
pub const INCREMENT_SENTINEL_FILE: &str = ".claudio-adversarial-incremental.json";
/// Written by the reviewer with its verdict on the current increment.
pub const REVIEW_SENTINEL_FILE: &str = ".claudio-adversarial-review.json";

const PREVIOUS_ROUNDS_GROUP_NAME: &str = "Previous Rounds";

const INCREMENT_SCHEMA: &str = "{round:int>=1, status:\"ready_for_review\"|\"failed\", summary:string, files_modified:[string] (>=1 when status=ready_for_review), approach:string, notes:string}";
const REVIEW_SCHEMA: &str = "{round:int>=1, approved:bool, score:int[1,10], strengths:[string], issues:[string], suggestions:[string], summary:string, required_changes:[string]}";

/// A fixed set of curly/angle/fullwidth quote characters the sanitizer
/// normalizes to plain ASCII before parsing (§4.10).
const SMART_QUOTES: &[(char, char)] = &[
    ('\u{201C}', '"'), // left double quotation mark
    ('\u{201D}', '"'), // right double quotation mark
    ('\u{2018}', '\''), // left single quotation mark
    ('\u{2019}', '\''), // right single quotation mark
    ('\u{00AB}', '"'), // left-pointing double angle quotation mark
    ('\u{00BB}', '"'), // right-pointing double angle quotation mark
    ('\u{2039}', '\''), // single left-pointing angle quotation mark
    ('\u{203A}', '\''), // single right-pointing angle quotation mark
    ('\u{FF02}', '"'), // fullwidth quotation mark
    ('\u{FF07}', '\''), // fullwidth apostrophe
];

/// Normalizes a sentinel file's raw content before JSON parsing:
/// (1) smart quotes → ASCII, (2) strip a wrapping fenced code block,
/// (3) trim anything before the first `{` or after the last `}` (§4.10,
/// P9).
pub fn sanitize_sentinel_json(raw: &str) -> String {
    let quoted: String = raw
        .chars()
        .map(|c| {
            SMART_QUOTES
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect();

    let unfenced = strip_code_fence(&quoted);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start <= end => unfenced[start..=end].to_string(),
        _ => unfenced,
    }
}

fn strip_code_fence(s: &str) -> String {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.strip_suffix("```") {
        Some(body) => body.trim().to_string(),
        None => rest.trim().to_string(),
    }
}

fn malformed(raw: &str, detail: impl Into<String>, schema: &'static str) -> Error {
    let preview: String = raw.chars().take(200).collect();
    Error::MalformedArtifact(format!(
        "{} (preview: {:?}, expected schema: {})",
        detail.into(),
        preview,
        schema
    ))
}

fn require_str(obj: &Map<String, Value>, field: &str, raw: &str, schema: &'static str) -> Result<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(raw, format!("missing or non-string field `{field}`"), schema))
}

fn require_u32(obj: &Map<String, Value>, field: &str, raw: &str, schema: &'static str) -> Result<u32> {
    obj.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| malformed(raw, format!("missing or non-integer field `{field}`"), schema))
}

fn require_u8(obj: &Map<String, Value>, field: &str, raw: &str, schema: &'static str) -> Result<u8> {
    obj.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| malformed(raw, format!("missing or non-integer field `{field}`"), schema))
}

fn require_bool(obj: &Map<String, Value>, field: &str, raw: &str, schema: &'static str) -> Result<bool> {
    obj.get(field)
        .and_then(Value::as_bool)
        .ok_or_else(|| malformed(raw, format!("missing or non-boolean field `{field}`"), schema))
}

fn require_str_array(obj: &Map<String, Value>, field: &str, raw: &str, schema: &'static str) -> Result<Vec<String>> {
    let arr = obj
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(raw, format!("missing or non-array field `{field}`"), schema))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(raw, format!("field `{field}` must be an array of strings"), schema))
        })
        .collect()
}

/// Parses a sanitized implementer sentinel. `files_modified` must carry
/// at least one entry when `status == ready_for_review` (§4.10).
pub fn parse_increment_file(raw: &str) -> Result<IncrementFile> {
    let sanitized = sanitize_sentinel_json(raw);
    let value: Value = serde_json::from_str(&sanitized)
        .map_err(|e| malformed(&sanitized, format!("invalid JSON: {e}"), INCREMENT_SCHEMA))?;
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(&sanitized, "top-level value is not a JSON object", INCREMENT_SCHEMA))?;

    let round = require_u32(obj, "round", &sanitized, INCREMENT_SCHEMA)?;
    if round < 1 {
        return Err(malformed(&sanitized, "field `round` must be >= 1", INCREMENT_SCHEMA));
    }
    let status_str = require_str(obj, "status", &sanitized, INCREMENT_SCHEMA)?;
    let status = match status_str.as_str() {
        "ready_for_review" => IncrementStatus::ReadyForReview,
        "failed" => IncrementStatus::Failed,
        other => {
            return Err(malformed(
                &sanitized,
                format!("field `status` has invalid value `{other}`"),
                INCREMENT_SCHEMA,
            ))
        }
    };
    let summary = require_str(obj, "summary", &sanitized, INCREMENT_SCHEMA)?;
    let files_modified = require_str_array(obj, "files_modified", &sanitized, INCREMENT_SCHEMA)?;
    if status == IncrementStatus::ReadyForReview && files_modified.is_empty() {
        return Err(malformed(
            &sanitized,
            "field `files_modified` must have at least one entry when status is ready_for_review",
            INCREMENT_SCHEMA,
        ));
    }
    let approach = require_str(obj, "approach", &sanitized, INCREMENT_SCHEMA)?;
    let notes = require_str(obj, "notes", &sanitized, INCREMENT_SCHEMA)?;

    Ok(IncrementFile { round, status, summary, files_modified, approach, notes })
}

/// Parses a sanitized reviewer sentinel. Score enforcement is applied by
/// the caller, not here (§4.10): this function only validates shape.
pub fn parse_review_file(raw: &str) -> Result<ReviewFile> {
    let sanitized = sanitize_sentinel_json(raw);
    let value: Value = serde_json::from_str(&sanitized)
        .map_err(|e| malformed(&sanitized, format!("invalid JSON: {e}"), REVIEW_SCHEMA))?;
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(&sanitized, "top-level value is not a JSON object", REVIEW_SCHEMA))?;

    let round = require_u32(obj, "round", &sanitized, REVIEW_SCHEMA)?;
    let approved = require_bool(obj, "approved", &sanitized, REVIEW_SCHEMA)?;
    let score = require_u8(obj, "score", &sanitized, REVIEW_SCHEMA)?;
    let strengths = require_str_array(obj, "strengths", &sanitized, REVIEW_SCHEMA)?;
    let issues = require_str_array(obj, "issues", &sanitized, REVIEW_SCHEMA)?;
    let suggestions = require_str_array(obj, "suggestions", &sanitized, REVIEW_SCHEMA)?;
    let summary = require_str(obj, "summary", &sanitized, REVIEW_SCHEMA)?;
    let required_changes = require_str_array(obj, "required_changes", &sanitized, REVIEW_SCHEMA)?;

    Ok(ReviewFile { round, approved, score, strengths, issues, suggestions, summary, required_changes })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Locates one sentinel file inside a worktree, caching the hit directory
/// so repeated polling during a round doesn't re-scan the tree every
/// time (§4.10 "Sentinel location").
struct SentinelLocator {
    filename: &'static str,
    rate_limit_window: Duration,
    cached_dir: Mutex<Option<PathBuf>>,
    last_full_search: Mutex<Option<Instant>>,
}

impl SentinelLocator {
    fn new(filename: &'static str, rate_limit_window: Duration) -> Self {
        Self {
            filename,
            rate_limit_window,
            cached_dir: Mutex::new(None),
            last_full_search: Mutex::new(None),
        }
    }

    fn probe(&self, dir: &Path) -> std::io::Result<Option<PathBuf>> {
        let candidate = dir.join(self.filename);
        if candidate.try_exists()? {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }

    /// Returns the sentinel's path if present. Honors the rate-limit
    /// window against the cached hit directory before falling back to a
    /// full search.
    fn find(&self, worktree_root: &Path) -> Result<Option<PathBuf>> {
        let cached = self.cached_dir.lock().expect("sentinel locator mutex poisoned").clone();
        if let Some(dir) = cached {
            match self.probe(&dir) {
                Ok(Some(path)) => {
                    let within_window = self
                        .last_full_search
                        .lock()
                        .expect("sentinel locator mutex poisoned")
                        .map(|t| t.elapsed() < self.rate_limit_window)
                        .unwrap_or(false);
                    if within_window {
                        return Ok(Some(path));
                    }
                }
                Ok(None) => {
                    *self.cached_dir.lock().expect("sentinel locator mutex poisoned") = None;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        self.full_search(worktree_root)
    }

    fn full_search(&self, worktree_root: &Path) -> Result<Option<PathBuf>> {
        *self.last_full_search.lock().expect("sentinel locator mutex poisoned") = Some(Instant::now());

        match self.probe(worktree_root) {
            Ok(Some(path)) => {
                self.cache(worktree_root);
                return Ok(Some(path));
            }
            Ok(None) => {}
            Err(e) => return Err(Error::Io(e)),
        }

        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(worktree_root)
            .map_err(Error::Io)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_dir() && !is_hidden(p))
            .collect();
        subdirs.sort();

        for dir in &subdirs {
            match self.probe(dir) {
                Ok(Some(path)) => {
                    self.cache(dir);
                    return Ok(Some(path));
                }
                Ok(None) => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if let Some(parent) = worktree_root.parent() {
            match self.probe(parent) {
                Ok(Some(path)) => {
                    self.cache(parent);
                    return Ok(Some(path));
                }
                Ok(None) => {}
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Ok(None)
    }

    fn cache(&self, dir: &Path) {
        *self.cached_dir.lock().expect("sentinel locator mutex poisoned") = Some(dir.to_path_buf());
    }

    fn clear(&self) {
        *self.cached_dir.lock().expect("sentinel locator mutex poisoned") = None;
    }
}

/// UI grouping collaborator the coordinator calls when it rotates a
/// finished round into "Previous Rounds" (§4.10). The UI surface itself
/// is out of scope (§1); this is only the contract the coordinator
/// consumes, so tests can substitute a counting stub for P6.
pub trait GroupDisplay: Send + Sync {
    fn move_sub_group_under(&self, sub_group_id: &str, container_id: &str, container_label: &str);
}

/// A `GroupDisplay` that does nothing, for callers with no UI to notify.
pub struct NullGroupDisplay;

impl GroupDisplay for NullGroupDisplay {
    fn move_sub_group_under(&self, _sub_group_id: &str, _container_id: &str, _container_label: &str) {}
}

/// Drives one adversarial session's implementer/reviewer cycle (§4.10).
pub struct AdversarialCoordinator {
    session: Arc<SessionStore<AdversarialSession>>,
    worker_pool: Arc<dyn WorkerPool>,
    checkout: Arc<dyn Checkout>,
    group_display: Arc<dyn GroupDisplay>,
    base_branch: String,
    stuck_grace_period: Duration,
    events: EventBus,
    view: Mutex<Option<WorkerView>>,
    increment_locator: SentinelLocator,
    review_locator: SentinelLocator,
}

impl AdversarialCoordinator {
    pub fn new(
        session: Arc<SessionStore<AdversarialSession>>,
        worker_pool: Arc<dyn WorkerPool>,
        checkout: Arc<dyn Checkout>,
        group_display: Arc<dyn GroupDisplay>,
        base_branch: impl Into<String>,
        stuck_grace_period: Duration,
        sentinel_rate_limit_window: Duration,
    ) -> Self {
        Self {
            session,
            worker_pool,
            checkout,
            group_display,
            base_branch: base_branch.into(),
            stuck_grace_period,
            events: EventBus::new(),
            view: Mutex::new(None),
            increment_locator: SentinelLocator::new(INCREMENT_SENTINEL_FILE, sentinel_rate_limit_window),
            review_locator: SentinelLocator::new(REVIEW_SENTINEL_FILE, sentinel_rate_limit_window),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore<AdversarialSession>> {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn id(&self) -> String {
        self.session.with(|s| s.id.clone())
    }

    fn current_view(&self) -> Result<WorkerView> {
        self.view
            .lock()
            .expect("adversarial coordinator view mutex poisoned")
            .clone()
            .ok_or_else(|| Error::Fatal("adversarial coordinator has no active worktree view".to_string()))
    }

    /// Round 1 creates the shared worktree view; every later round reuses
    /// it from this cache rather than asking `Checkout` again (§4.10).
    fn ensure_view(&self) -> Result<WorkerView> {
        if let Some(view) = self.view.lock().expect("adversarial coordinator view mutex poisoned").clone() {
            return Ok(view);
        }
        let task_id = self.id();
        let view = self.checkout.view_for(&task_id, &self.base_branch)?;
        *self.view.lock().expect("adversarial coordinator view mutex poisoned") = Some(view.clone());
        self.session.with_mut(|s| {
            s.worktree_path = Some(view.path.to_string_lossy().to_string());
        });
        Ok(view)
    }

    /// Moves round `R-1`'s two instances under the shared "Previous
    /// Rounds" container the first time round `R` starts either role.
    /// Idempotent per round (P6): skipped once `SubGroupID` is recorded.
    fn maybe_move_previous_round(&self, round: u32) -> Result<()> {
        if round < 2 {
            return Ok(());
        }
        let prev_round = round - 1;
        let already_moved = self.session.with(|s| {
            s.history
                .iter()
                .rev()
                .find(|r| r.round == prev_round)
                .and_then(|r| r.sub_group_id.clone())
        });
        if already_moved.is_some() {
            return Ok(());
        }

        let base_id = self.session.with(|s| s.group_base_id().to_string());
        let sub_group_id = format!("{base_id}-round-{prev_round}");
        let container_id = format!("{base_id}-previous-rounds");
        self.group_display
            .move_sub_group_under(&sub_group_id, &container_id, PREVIOUS_ROUNDS_GROUP_NAME);

        self.session.with_mut(|s| {
            if let Some(entry) = s.history.iter_mut().rev().find(|r| r.round == prev_round) {
                entry.sub_group_id = Some(sub_group_id.clone());
            }
        });
        Ok(())
    }

    /// StartImplementer: creates (round 1) or reuses (round ≥ 2) the
    /// shared worktree view, rotates the previous round if due, and
    /// launches the implementer worker (§4.10).
    pub async fn start_implementer(&self) -> Result<String> {
        let round = self.session.with(|s| s.current_round);
        self.maybe_move_previous_round(round)?;
        let view = self.ensure_view()?;

        let task_description = self.session.with(|s| s.task.clone());
        let task = Task {
            id: format!("{}-round-{}-implement", self.id(), round),
            title: task_description.clone(),
            dependencies: vec![],
        };
        let prompt = format!(
            "Round {round} of an adversarial implementation cycle.\n\
             Objective: {task_description}\n\n\
             Write `{INCREMENT_SENTINEL_FILE}` in the worktree root when done, with \
             fields {{round, status: \"ready_for_review\"|\"failed\", summary, \
             files_modified, approach, notes}}."
        );
        let instance = self.worker_pool.add_instance(&task, &view, &prompt).await?;

        self.session.with_mut(|s| {
            s.implementer_id = Some(instance.id.clone());
            s.phase = AdversarialPhase::Implementing;
            s.current_round_mut().implementer_id = Some(instance.id.clone());
        });
        self.events.emit(Event::PhaseChanged { session_id: self.id(), phase: "implementing".to_string() });
        Ok(instance.id)
    }

    /// StartReviewer: launches the reviewer worker against the same
    /// shared view, over the implementer's recorded increment.
    pub async fn start_reviewer(&self) -> Result<String> {
        let round = self.session.with(|s| s.current_round);
        self.maybe_move_previous_round(round)?;
        let view = self.current_view()?;

        let task_description = self.session.with(|s| s.task.clone());
        let increment_summary = self
            .session
            .with(|s| s.current_round_ref().increment.as_ref().map(|i| i.summary.clone()))
            .unwrap_or_default();
        let task = Task {
            id: format!("{}-round-{}-review", self.id(), round),
            title: task_description.clone(),
            dependencies: vec![],
        };
        let prompt = format!(
            "Round {round} review of an adversarial implementation cycle.\n\
             Objective: {task_description}\n\
             Implementer's summary: {increment_summary}\n\n\
             Write `{REVIEW_SENTINEL_FILE}` in the worktree root with fields \
             {{round, approved, score (1-10), strengths, issues, suggestions, \
             summary, required_changes}}."
        );
        let instance = self.worker_pool.add_instance(&task, &view, &prompt).await?;

        self.session.with_mut(|s| {
            s.reviewer_id = Some(instance.id.clone());
            s.phase = AdversarialPhase::Reviewing;
            s.current_round_mut().reviewer_id = Some(instance.id.clone());
        });
        self.events.emit(Event::PhaseChanged { session_id: self.id(), phase: "reviewing".to_string() });
        Ok(instance.id)
    }

    /// Polls for the increment sentinel; if present, parses it, deletes
    /// it, and advances the round (§4.10). Returns `false` if the
    /// sentinel hasn't appeared yet.
    pub async fn process_increment_completion(&self) -> Result<bool> {
        let view = self.current_view()?;
        let Some(path) = self.increment_locator.find(&view.path)? else {
            return Ok(false);
        };
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let increment = parse_increment_file(&raw)?;
        std::fs::remove_file(&path).map_err(Error::Io)?;
        self.increment_locator.clear();
        self.clear_stuck_watch();

        let round = self.session.with(|s| s.current_round);
        self.session.with_mut(|s| {
            s.current_round_mut().increment = Some(increment.clone());
        });

        if increment.status == IncrementStatus::Failed {
            self.session.with_mut(|s| {
                s.phase = AdversarialPhase::Failed;
                s.error = Some(format!("implementer reported failure in round {round}: {}", increment.notes));
            });
            self.events.emit(Event::Complete { session_id: self.id() });
            return Ok(true);
        }

        self.start_reviewer().await?;
        Ok(true)
    }

    /// Polls for the review sentinel; if present, parses it, applies
    /// score enforcement, and either completes or starts the next round
    /// (§4.10, P5). Returns `false` if the sentinel hasn't appeared yet.
    pub async fn process_review_completion(&self) -> Result<bool> {
        let view = self.current_view()?;
        let Some(path) = self.review_locator.find(&view.path)? else {
            return Ok(false);
        };
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut review = parse_review_file(&raw)?;
        std::fs::remove_file(&path).map_err(Error::Io)?;
        self.review_locator.clear();
        self.clear_stuck_watch();

        self.enforce_min_score(&mut review);

        let round = self.session.with(|s| s.current_round);
        let reviewed_at = Utc::now();
        self.session.with_mut(|s| {
            let entry = s.current_round_mut();
            entry.review = Some(review.clone());
            entry.reviewed_at = Some(reviewed_at);
        });

        if review.approved {
            self.session.with_mut(|s| s.phase = AdversarialPhase::Approved);
            self.finish_approved(round, &review.summary)
        } else {
            self.handle_rejection(round, &review).await
        }
    }

    /// Score enforcement (P5): an `approved: true` review below
    /// `MinPassingScore` is flipped to rejected before any callback
    /// fires, and gets a one-sentence reason appended if the reviewer
    /// left `required_changes` empty.
    fn enforce_min_score(&self, review: &mut ReviewFile) {
        let min_score = self.session.with(|s| s.config.min_passing_score);
        if review.approved && review.score < min_score {
            review.approved = false;
            if review.required_changes.is_empty() {
                review
                    .required_changes
                    .push(format!("score {} is below the minimum passing score of {min_score}", review.score));
            }
        }
    }

    fn finish_approved(&self, round: u32, summary: &str) -> Result<bool> {
        self.session.with_mut(|s| s.phase = AdversarialPhase::Complete);
        self.events.emit(Event::Approved { session_id: self.id(), round, summary: summary.to_string() });
        self.events.emit(Event::Complete { session_id: self.id() });
        Ok(true)
    }

    async fn handle_rejection(&self, round: u32, review: &ReviewFile) -> Result<bool> {
        self.events.emit(Event::Rejected { session_id: self.id(), round, summary: review.summary.clone() });

        let max_reached = self.session.with(|s| s.is_max_iterations_reached());
        if max_reached {
            self.session.with_mut(|s| {
                s.phase = AdversarialPhase::Failed;
                s.error = Some(format!("max iterations reached after round {round} rejection"));
            });
            self.events.emit(Event::Complete { session_id: self.id() });
            return Ok(true);
        }

        self.session.with_mut(|s| {
            s.current_round += 1;
            let next = s.current_round;
            s.history.push(Round::new(next, Utc::now()));
            s.phase = AdversarialPhase::Implementing;
        });
        self.start_implementer().await?;
        Ok(true)
    }

    /// An operator entry point from `Phase::Complete`: writing a review
    /// file with `approved: false` into the view re-opens an
    /// already-approved session (§4.10).
    pub async fn process_rejection_after_approval(&self) -> Result<bool> {
        let phase = self.session.with(|s| s.phase);
        if phase != AdversarialPhase::Complete {
            return Err(Error::InvalidRequest(
                "process_rejection_after_approval requires Phase::Complete".to_string(),
            ));
        }
        let view = self.current_view()?;
        let Some(path) = self.review_locator.find(&view.path)? else {
            return Ok(false);
        };
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut review = parse_review_file(&raw)?;
        if review.approved {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(Error::Io)?;
        self.review_locator.clear();
        self.enforce_min_score(&mut review);

        let round = self.session.with(|s| s.current_round);
        self.session.with_mut(|s| {
            s.current_round_mut().review = Some(review.clone());
        });
        self.handle_rejection(round, &review).await
    }

    fn role_for_instance(&self, instance_id: &str) -> Option<Role> {
        self.session.with(|s| {
            if s.implementer_id.as_deref() == Some(instance_id) {
                Some(Role::Implementer)
            } else if s.reviewer_id.as_deref() == Some(instance_id) {
                Some(Role::Reviewer)
            } else {
                None
            }
        })
    }

    fn sentinel_present_for_role(&self, role: Role, view: &WorkerView) -> Result<bool> {
        Ok(match role {
            Role::Implementer => self.increment_locator.find(&view.path)?.is_some(),
            Role::Reviewer => self.review_locator.find(&view.path)?.is_some(),
        })
    }

    fn clear_stuck_watch(&self) {
        self.session.with_mut(|s| s.stuck_watch_started_at = None);
    }

    /// HandleInstanceCompletion (§4.10 "Stuck detection"): called when the
    /// worker pool observes `instance_id` exit. Returns `true` iff this
    /// observation transitioned the session to `Stuck`.
    pub fn handle_instance_completion(&self, instance_id: &str, completed: bool, _failed: bool) -> Result<bool> {
        let Some(role) = self.role_for_instance(instance_id) else {
            return Ok(false);
        };
        let view = self.current_view()?;
        let sentinel_present = self.sentinel_present_for_role(role, &view)?;

        if !completed || sentinel_present {
            self.clear_stuck_watch();
            return Ok(false);
        }

        let first_seen = self.session.with(|s| s.stuck_watch_started_at);
        let Some(first_seen) = first_seen else {
            self.session.with_mut(|s| s.stuck_watch_started_at = Some(Utc::now()));
            return Ok(false);
        };

        let elapsed = Utc::now()
            .signed_duration_since(first_seen)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed < self.stuck_grace_period {
            return Ok(false);
        }

        self.session.with_mut(|s| {
            s.phase = AdversarialPhase::Stuck;
            s.stuck_role = Some(role);
        });
        self.events.emit(Event::Stuck { session_id: self.id(), role: role.to_string() });
        Ok(true)
    }

    /// RestartStuckRole: requires `Phase::Stuck`; for a stuck reviewer,
    /// also requires the current round's increment to already be in
    /// history. Preserves `Error`/`StuckRole` on failure so the operator
    /// can retry (§4.10).
    pub async fn restart_stuck_role(&self) -> Result<String> {
        let (phase, stuck_role) = self.session.with(|s| (s.phase, s.stuck_role));
        if phase != AdversarialPhase::Stuck {
            return Err(Error::InvalidRequest("restart_stuck_role requires Phase::Stuck".to_string()));
        }
        let Some(role) = stuck_role else {
            return Err(Error::InvalidRequest("restart_stuck_role requires a stuck role".to_string()));
        };

        if role == Role::Reviewer {
            let round = self.session.with(|s| s.current_round);
            let has_increment = self.session.with(|s| {
                s.history
                    .iter()
                    .rev()
                    .find(|r| r.round == round)
                    .map(|r| r.increment.is_some())
                    .unwrap_or(false)
            });
            if !has_increment {
                return Err(Error::InvalidRequest(
                    "cannot restart stuck reviewer: current round has no recorded increment".to_string(),
                ));
            }
        }

        let old_instance = self.session.with(|s| match role {
            Role::Implementer => s.implementer_id.clone(),
            Role::Reviewer => s.reviewer_id.clone(),
        });
        if let Some(id) = &old_instance {
            if let Err(e) = self.worker_pool.stop_instance(id).await {
                tracing::warn!(error = %e, instance = %id, "best-effort stop of stuck worker failed");
            }
        }
        self.clear_stuck_watch();

        let result = match role {
            Role::Implementer => self.start_implementer().await,
            Role::Reviewer => self.start_reviewer().await,
        };

        match result {
            Ok(instance_id) => {
                self.session.with_mut(|s| {
                    s.stuck_role = None;
                    s.phase = match role {
                        Role::Implementer => AdversarialPhase::Implementing,
                        Role::Reviewer => AdversarialPhase::Reviewing,
                    };
                });
                Ok(instance_id)
            }
            Err(e) => {
                self.session.with_mut(|s| s.error = Some(e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::worker_pool::{Completion, Instance, InstanceStatus};
    use crate::session::{AdversarialConfig, NullPersistence};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    // ---- sanitize/parse ------------------------------------------------

    #[test]
    fn test_sanitize_strips_fence_and_smart_quotes() {
        let raw = "```json\n\u{201C}hello\u{201D}: \u{2018}world\u{2019}\n```";
        assert_eq!(sanitize_sentinel_json(raw), "\"hello\": 'world'");
        // Wrapped object round-trips identically to the unwrapped ASCII form (P9).
        let wrapped = format!(
            "```json\n{{\u{201C}round\u{201D}: 1, \u{201C}status\u{201D}: \u{201C}failed\u{201D}, \u{201C}summary\u{201D}: \u{201C}s\u{201D}, \u{201C}files_modified\u{201D}: [], \u{201C}approach\u{201D}: \u{201C}a\u{201D}, \u{201C}notes\u{201D}: \u{201C}n\u{201D}}}\n```"
        );
        let plain = r#"{"round": 1, "status": "failed", "summary": "s", "files_modified": [], "approach": "a", "notes": "n"}"#;
        assert_eq!(sanitize_sentinel_json(&wrapped), plain);
    }

    #[test]
    fn test_sanitize_trims_prose_around_braces() {
        let raw = "Here you go:\n{\"a\": 1}\nhope that helps!";
        assert_eq!(sanitize_sentinel_json(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_parse_increment_rejects_missing_field() {
        let raw = r#"{"round": 1, "status": "ready_for_review", "summary": "s", "files_modified": ["a.rs"], "approach": "a"}"#;
        let err = parse_increment_file(raw).unwrap_err();
        assert!(matches!(err, Error::MalformedArtifact(_)));
        assert!(err.to_string().contains("notes"));
    }

    #[test]
    fn test_parse_increment_requires_files_modified_when_ready() {
        let raw = r#"{"round": 1, "status": "ready_for_review", "summary": "s", "files_modified": [], "approach": "a", "notes": "n"}"#;
        let err = parse_increment_file(raw).unwrap_err();
        assert!(err.to_string().contains("files_modified"));
    }

    #[test]
    fn test_parse_increment_allows_empty_files_modified_when_failed() {
        let raw = r#"{"round": 1, "status": "failed", "summary": "s", "files_modified": [], "approach": "a", "notes": "n"}"#;
        let increment = parse_increment_file(raw).unwrap();
        assert_eq!(increment.status, IncrementStatus::Failed);
    }

    #[test]
    fn test_parse_review_rejects_wrong_type() {
        let raw = r#"{"round": "one", "approved": true, "score": 9, "strengths": [], "issues": [], "suggestions": [], "summary": "s", "required_changes": []}"#;
        let err = parse_review_file(raw).unwrap_err();
        assert!(err.to_string().contains("round"));
    }

    #[test]
    fn test_parse_review_accepts_well_formed_file() {
        let raw = r#"{"round": 2, "approved": true, "score": 9, "strengths": ["x"], "issues": [], "suggestions": [], "summary": "great", "required_changes": []}"#;
        let review = parse_review_file(raw).unwrap();
        assert!(review.approved);
        assert_eq!(review.score, 9);
    }

    // ---- SentinelLocator -------------------------------------------------

    #[test]
    fn test_locator_finds_in_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INCREMENT_SENTINEL_FILE), "{}").unwrap();
        let locator = SentinelLocator::new(INCREMENT_SENTINEL_FILE, Duration::from_secs(2));
        let found = locator.find(dir.path()).unwrap();
        assert_eq!(found, Some(dir.path().join(INCREMENT_SENTINEL_FILE)));
    }

    #[test]
    fn test_locator_finds_in_subdir_skipping_hidden() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join(INCREMENT_SENTINEL_FILE), "{}").unwrap();
        let sub = dir.path().join("repo");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join(INCREMENT_SENTINEL_FILE), "{}").unwrap();

        let locator = SentinelLocator::new(INCREMENT_SENTINEL_FILE, Duration::from_secs(2));
        let found = locator.find(dir.path()).unwrap();
        assert_eq!(found, Some(sub.join(INCREMENT_SENTINEL_FILE)));
    }

    #[test]
    fn test_locator_clears_stale_cache_and_refinds() {
        let dir = TempDir::new().unwrap();
        let sentinel = dir.path().join(INCREMENT_SENTINEL_FILE);
        std::fs::write(&sentinel, "{}").unwrap();
        let locator = SentinelLocator::new(INCREMENT_SENTINEL_FILE, Duration::from_secs(2));
        assert!(locator.find(dir.path()).unwrap().is_some());

        std::fs::remove_file(&sentinel).unwrap();
        assert!(locator.find(dir.path()).unwrap().is_none());

        std::fs::write(&sentinel, "{}").unwrap();
        assert!(locator.find(dir.path()).unwrap().is_some());
    }

    // ---- AdversarialCoordinator round loop -------------------------------

    struct StubWorkerPool {
        next_id: StdMutex<u32>,
    }

    #[async_trait]
    impl WorkerPool for StubWorkerPool {
        async fn add_instance(&self, _task: &Task, view: &WorkerView, _prompt: &str) -> Result<Instance> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(Instance {
                id: format!("inst-{}", next),
                worktree_path: view.path.clone(),
                branch: view.branch.clone(),
                status: InstanceStatus::Running,
                files_modified: vec![],
            })
        }
        async fn start_instance(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn stop_instance(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn get_instance(&self, _id: &str) -> Option<Instance> {
            None
        }
        async fn poll_task_completions(&self) -> Vec<Completion> {
            vec![]
        }
    }

    struct StubCheckout {
        root: PathBuf,
    }
    impl Checkout for StubCheckout {
        fn view_for(&self, _task_id: &str, base: &str) -> Result<WorkerView> {
            Ok(WorkerView {
                path: self.root.clone(),
                branch: "flockwork/adversarial".to_string(),
                base_branch: base.to_string(),
            })
        }
        fn merge(&self, _base: &str, _into: &str, branches: &[String], _group: usize) -> Result<crate::git::MergeOutcome> {
            Ok(crate::git::MergeOutcome { commit: "deadbeef".to_string(), merged_branches: branches.to_vec() })
        }
        fn verify(&self, _view: &WorkerView) -> super::super::verifier::VerificationOutcome {
            super::super::verifier::VerificationOutcome { success: true, commit_count: 1, error: None }
        }
    }

    #[derive(Default)]
    struct CountingGroupDisplay {
        calls: StdMutex<HashMap<String, u32>>,
    }
    impl GroupDisplay for CountingGroupDisplay {
        fn move_sub_group_under(&self, sub_group_id: &str, _container_id: &str, _container_label: &str) {
            *self.calls.lock().unwrap().entry(sub_group_id.to_string()).or_insert(0) += 1;
        }
    }

    fn coordinator(dir: &TempDir) -> (AdversarialCoordinator, Arc<CountingGroupDisplay>) {
        let session = Arc::new(SessionStore::new(
            AdversarialSession::new("s1", "build a widget", AdversarialConfig { max_iterations: 3, min_passing_score: 7 }, Utc::now()),
            Arc::new(NullPersistence),
        ));
        let pool: Arc<dyn WorkerPool> = Arc::new(StubWorkerPool { next_id: StdMutex::new(0) });
        let checkout: Arc<dyn Checkout> = Arc::new(StubCheckout { root: dir.path().to_path_buf() });
        let display = Arc::new(CountingGroupDisplay::default());
        let coord = AdversarialCoordinator::new(
            session,
            pool,
            checkout,
            display.clone(),
            "main",
            Duration::from_millis(50),
            Duration::from_secs(2),
        );
        (coord, display)
    }

    #[tokio::test]
    async fn test_start_implementer_creates_view_once() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.start_implementer().await.unwrap();
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Implementing);
        assert!(coord.session.with(|s| s.implementer_id.is_some()));
    }

    #[tokio::test]
    async fn test_approval_above_min_score_completes() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.start_implementer().await.unwrap();

        std::fs::write(
            dir.path().join(INCREMENT_SENTINEL_FILE),
            r#"{"round": 1, "status": "ready_for_review", "summary": "did it", "files_modified": ["a.rs"], "approach": "x", "notes": ""}"#,
        )
        .unwrap();
        assert!(coord.process_increment_completion().await.unwrap());
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Reviewing);

        std::fs::write(
            dir.path().join(REVIEW_SENTINEL_FILE),
            r#"{"round": 1, "approved": true, "score": 9, "strengths": [], "issues": [], "suggestions": [], "summary": "nice", "required_changes": []}"#,
        )
        .unwrap();
        let approved = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let (a, r) = (approved.clone(), rejected.clone());
        coord.events().subscribe(Arc::new(move |e| match e {
            Event::Approved { .. } => { a.fetch_add(1, Ordering::SeqCst); }
            Event::Rejected { .. } => { r.fetch_add(1, Ordering::SeqCst); }
            _ => {}
        }));
        assert!(coord.process_review_completion().await.unwrap());

        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Complete);
        assert_eq!(approved.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_approval_below_min_score_is_flipped_to_rejected() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.start_implementer().await.unwrap();
        std::fs::write(
            dir.path().join(INCREMENT_SENTINEL_FILE),
            r#"{"round": 1, "status": "ready_for_review", "summary": "did it", "files_modified": ["a.rs"], "approach": "x", "notes": ""}"#,
        )
        .unwrap();
        coord.process_increment_completion().await.unwrap();

        std::fs::write(
            dir.path().join(REVIEW_SENTINEL_FILE),
            r#"{"round": 1, "approved": true, "score": 6, "strengths": [], "issues": [], "suggestions": [], "summary": "meh", "required_changes": []}"#,
        )
        .unwrap();
        let rejected = Arc::new(AtomicUsize::new(0));
        let approved = Arc::new(AtomicUsize::new(0));
        let (r, a) = (rejected.clone(), approved.clone());
        coord.events().subscribe(Arc::new(move |e| match e {
            Event::Rejected { .. } => { r.fetch_add(1, Ordering::SeqCst); }
            Event::Approved { .. } => { a.fetch_add(1, Ordering::SeqCst); }
            _ => {}
        }));
        coord.process_review_completion().await.unwrap();

        assert_eq!(approved.load(Ordering::SeqCst), 0);
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        coord.session.with(|s| {
            let review = s.history[0].review.as_ref().unwrap();
            assert!(!review.approved);
            assert!(!review.required_changes.is_empty());
        });
        // Rejected and under the iteration cap: a new round started.
        assert_eq!(coord.session.with(|s| s.current_round), 2);
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Implementing);
    }

    #[tokio::test]
    async fn test_max_iterations_reached_fails_instead_of_restarting() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.session.with_mut(|s| s.current_round = 4); // > max_iterations(3)
        coord.start_implementer().await.unwrap();
        std::fs::write(
            dir.path().join(INCREMENT_SENTINEL_FILE),
            r#"{"round": 4, "status": "ready_for_review", "summary": "s", "files_modified": ["a.rs"], "approach": "x", "notes": ""}"#,
        )
        .unwrap();
        coord.process_increment_completion().await.unwrap();
        std::fs::write(
            dir.path().join(REVIEW_SENTINEL_FILE),
            r#"{"round": 4, "approved": false, "score": 2, "strengths": [], "issues": [], "suggestions": [], "summary": "no", "required_changes": ["fix x"]}"#,
        )
        .unwrap();
        coord.process_review_completion().await.unwrap();
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Failed);
    }

    #[tokio::test]
    async fn test_previous_rounds_move_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (coord, display) = coordinator(&dir);
        coord.session.with_mut(|s| {
            s.current_round = 2;
            s.history.push(Round::new(2, Utc::now()));
        });

        coord.start_implementer().await.unwrap();
        coord.start_reviewer().await.unwrap();

        let calls = display.calls.lock().unwrap();
        assert_eq!(calls.get("s1-round-1").copied(), Some(1));
        coord.session.with(|s| {
            assert_eq!(s.history[0].sub_group_id.as_deref(), Some("s1-round-1"));
        });
    }

    #[tokio::test]
    async fn test_stuck_detection_grace_period_then_stuck() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.start_implementer().await.unwrap();
        let instance_id = coord.session.with(|s| s.implementer_id.clone().unwrap());

        // First observation: grace period starts, not yet stuck.
        assert!(!coord.handle_instance_completion(&instance_id, true, false).unwrap());
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Implementing);

        std::thread::sleep(Duration::from_millis(80));

        let became_stuck = coord.handle_instance_completion(&instance_id, true, false).unwrap();
        assert!(became_stuck);
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Stuck);
        assert_eq!(coord.session.with(|s| s.stuck_role), Some(Role::Implementer));
    }

    #[tokio::test]
    async fn test_restart_stuck_role_recovers() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.start_implementer().await.unwrap();
        let instance_id = coord.session.with(|s| s.implementer_id.clone().unwrap());
        coord.handle_instance_completion(&instance_id, true, false).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert!(coord.handle_instance_completion(&instance_id, true, false).unwrap());

        coord.restart_stuck_role().await.unwrap();
        assert_eq!(coord.session.with(|s| s.phase), AdversarialPhase::Implementing);
        assert!(coord.session.with(|s| s.stuck_role.is_none()));
    }

    #[tokio::test]
    async fn test_restart_stuck_reviewer_requires_increment_in_history() {
        let dir = TempDir::new().unwrap();
        let (coord, _) = coordinator(&dir);
        coord.session.with_mut(|s| {
            s.phase = AdversarialPhase::Stuck;
            s.stuck_role = Some(Role::Reviewer);
        });
        let err = coord.restart_stuck_role().await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
