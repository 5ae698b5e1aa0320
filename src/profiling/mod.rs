//! Profiling recorder
//!
//! Collects per-commit render durations while profiling is active, plus an
//! optional timeline of the host's phase marks. Data is keyed by the same
//! shadow ids as the operations stream but is not streamed: the frontend
//! fetches it in bulk with `getProfilingData`.
//!
//! # Main Types
//!
//! - [`ProfilingRecorder`] - state machine (Idle/Active) and commit records
//! - [`TimelineRecorder`] - nested phase spans, scheduling events
//! - [`ProfilingData`] - exported result
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──► Active ──stop()──► Idle
//!                     │
//!        begin_commit / record_durations / finish_commit (per host commit)
//! ```
//!
//! `stop` keeps everything recorded; the next `start` discards it.

pub mod timeline;
pub mod types;

pub use timeline::{
    ComponentMeasureType, Measure, MeasureType, SchedulingEventType, TimelineData,
    TimelineRecorder,
};
pub use types::{
    ChangeDescription, CommitData, CommitProfile, NodeDuration, ProfilingData, RootProfilingData,
};

use crate::config::ProfilingConfig;
use crate::error::{InspectorError, Result};
use crate::scheduler::{as_millis_f64, SharedClock};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Whether commits are being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfilingState {
    #[default]
    Idle,
    Active,
}

/// Per-attachment profiling data
pub struct ProfilingRecorder {
    clock: SharedClock,
    state: ProfilingState,
    record_change_descriptions: bool,
    record_timeline: bool,
    started_at: f64,
    recorded_at: Option<DateTime<Utc>>,
    initial_tree_base_durations: IndexMap<u32, f64>,
    initial_id_to_root: IndexMap<u32, u32>,
    root_display_names: IndexMap<u32, String>,
    /// `None` until the first `start`
    commits_by_root: Option<IndexMap<u32, Vec<CommitProfile>>>,
    current_commit: Option<CommitProfile>,
    /// Root and index of the last stored commit, for post-commit effect durations
    last_commit: Option<(u32, usize)>,
    timeline: TimelineRecorder,
}

impl std::fmt::Debug for ProfilingRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingRecorder")
            .field("state", &self.state)
            .field("record_change_descriptions", &self.record_change_descriptions)
            .field("roots", &self.commits_by_root.as_ref().map(|m| m.len()))
            .field("timeline", &self.timeline)
            .finish()
    }
}

impl ProfilingRecorder {
    pub fn new(config: &ProfilingConfig, clock: SharedClock) -> Self {
        Self {
            timeline: TimelineRecorder::new(clock.clone()),
            clock,
            state: ProfilingState::Idle,
            record_change_descriptions: config.record_change_descriptions,
            record_timeline: config.record_timeline,
            started_at: 0.0,
            recorded_at: None,
            initial_tree_base_durations: IndexMap::new(),
            initial_id_to_root: IndexMap::new(),
            root_display_names: IndexMap::new(),
            commits_by_root: None,
            current_commit: None,
            last_commit: None,
        }
    }

    pub fn state(&self) -> ProfilingState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == ProfilingState::Active
    }

    pub fn records_change_descriptions(&self) -> bool {
        self.is_active() && self.record_change_descriptions
    }

    /// Begin a session, snapshotting the tree as it is now
    ///
    /// Returns false (and changes nothing) if already active.
    pub fn start(
        &mut self,
        record_change_descriptions: bool,
        tree_base_durations: &IndexMap<u32, f64>,
        id_to_root: &IndexMap<u32, u32>,
        root_display_names: IndexMap<u32, String>,
        lane_labels: Vec<String>,
    ) -> bool {
        if self.is_active() {
            return false;
        }

        self.record_change_descriptions = record_change_descriptions;
        self.initial_tree_base_durations = tree_base_durations.clone();
        self.initial_id_to_root = id_to_root.clone();
        self.root_display_names = root_display_names;
        self.commits_by_root = Some(IndexMap::new());
        self.current_commit = None;
        self.last_commit = None;
        self.started_at = self.now();
        self.recorded_at = Some(Utc::now());
        self.state = ProfilingState::Active;

        if self.record_timeline {
            self.timeline.start(lane_labels);
        }

        tracing::info!(
            "Profiling started ({} roots, change descriptions: {})",
            self.root_display_names.len(),
            record_change_descriptions
        );
        true
    }

    /// End the session; recorded data stays queryable
    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        self.state = ProfilingState::Idle;
        self.current_commit = None;
        self.timeline.stop();
        tracing::info!(
            "Profiling stopped ({} commits)",
            self.commits_by_root
                .as_ref()
                .map(|m| m.values().map(Vec::len).sum::<usize>())
                .unwrap_or(0)
        );
    }

    /// Remember the display name of a root mounted while profiling
    pub fn record_root_display_name(&mut self, root_id: u32, name: String) {
        if self.is_active() {
            self.root_display_names.insert(root_id, name);
        }
    }

    // --- Per-commit ---

    /// Open the record for a commit (no-op unless active)
    pub fn begin_commit(&mut self, priority_level: Option<String>) {
        if !self.is_active() {
            self.current_commit = None;
            return;
        }
        let timestamp = self.now() - self.started_at;
        self.current_commit = Some(CommitProfile {
            timestamp,
            priority_level,
            change_descriptions: self.record_change_descriptions.then(IndexMap::new),
            ..CommitProfile::default()
        });
    }

    /// Record one node's durations in the open commit
    pub fn record_durations(&mut self, id: u32, actual: f64, self_duration: f64) {
        if let Some(commit) = self.current_commit.as_mut() {
            commit.durations.push(NodeDuration {
                id,
                actual,
                self_duration,
            });
            commit.max_actual_duration = commit.max_actual_duration.max(actual);
        }
    }

    pub fn record_change_description(&mut self, id: u32, description: ChangeDescription) {
        if let Some(descriptions) = self
            .current_commit
            .as_mut()
            .and_then(|c| c.change_descriptions.as_mut())
        {
            descriptions.insert(id, description);
        }
    }

    /// True if the open commit recorded any durations
    pub fn has_commit_durations(&self) -> bool {
        self.current_commit
            .as_ref()
            .map(|c| !c.durations.is_empty())
            .unwrap_or(false)
    }

    /// Close the open commit, storing it under `root_id` if `keep`
    pub fn finish_commit(&mut self, root_id: u32, keep: bool) {
        let Some(commit) = self.current_commit.take() else {
            return;
        };
        if !keep {
            return;
        }
        if let Some(by_root) = self.commits_by_root.as_mut() {
            let commits = by_root.entry(root_id).or_default();
            commits.push(commit);
            self.last_commit = Some((root_id, commits.len() - 1));
        }
    }

    /// Attach effect durations reported after the commit of `root_id`
    pub fn set_effect_durations(&mut self, root_id: u32, effect: Option<f64>, passive: Option<f64>) {
        if !self.is_active() {
            return;
        }
        let Some((last_root, index)) = self.last_commit else {
            return;
        };
        if last_root != root_id {
            return;
        }
        if let Some(commit) = self
            .commits_by_root
            .as_mut()
            .and_then(|m| m.get_mut(&root_id))
            .and_then(|c| c.get_mut(index))
        {
            commit.effect_duration = effect;
            commit.passive_effect_duration = passive;
        }
    }

    /// Stored commits of one root
    pub fn commits(&self, root_id: u32) -> &[CommitProfile] {
        self.commits_by_root
            .as_ref()
            .and_then(|m| m.get(&root_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn timeline(&self) -> &TimelineRecorder {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut TimelineRecorder {
        &mut self.timeline
    }

    /// Export everything recorded by the last session
    pub fn profiling_data(&self, renderer_id: u32) -> Result<ProfilingData> {
        let by_root = self.commits_by_root.as_ref().ok_or_else(|| {
            InspectorError::InvalidState("no profiling data has been recorded".to_string())
        })?;

        let data_for_roots = by_root
            .iter()
            .map(|(&root_id, commits)| RootProfilingData {
                root_id,
                display_name: self
                    .root_display_names
                    .get(&root_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                initial_tree_base_durations: self
                    .initial_tree_base_durations
                    .iter()
                    .filter(|(id, _)| self.initial_id_to_root.get(*id) == Some(&root_id))
                    .map(|(&id, &duration)| (id, duration))
                    .collect(),
                commit_data: commits.iter().map(CommitProfile::to_commit_data).collect(),
            })
            .collect();

        Ok(ProfilingData {
            renderer_id,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            data_for_roots,
            timeline: self.record_timeline.then(|| self.timeline.data().clone()),
        })
    }

    fn now(&self) -> f64 {
        as_millis_f64(self.clock.now())
    }
}
