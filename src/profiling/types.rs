//! Profiling records and their exported shape
//!
//! [`CommitProfile`] is the in-memory per-commit record; [`ProfilingData`]
//! is what `getProfilingData` returns. Duration pairs serialize as
//! `[id, ms]` arrays.

use super::timeline::TimelineData;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Why a component rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    pub is_first_mount: bool,
    /// Changed prop keys (`None` on first mount)
    pub props: Option<Vec<String>>,
    /// Changed state keys (`None` on first mount)
    pub state: Option<Vec<String>>,
    /// Indices of changed hooks, when the host reports them
    pub hooks: Option<Vec<u32>>,
    pub did_hooks_change: bool,
}

impl ChangeDescription {
    pub fn first_mount() -> Self {
        Self {
            is_first_mount: true,
            props: None,
            state: None,
            hooks: None,
            did_hooks_change: false,
        }
    }
}

/// Render time of one node in one commit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDuration {
    pub id: u32,
    /// Node plus descendants
    pub actual: f64,
    /// Actual minus the direct children's actual durations
    pub self_duration: f64,
}

/// Everything recorded for one commit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitProfile {
    /// Milliseconds since profiling started
    pub timestamp: f64,
    pub priority_level: Option<String>,
    pub durations: Vec<NodeDuration>,
    pub max_actual_duration: f64,
    /// `Some` when change descriptions are being recorded
    pub change_descriptions: Option<IndexMap<u32, ChangeDescription>>,
    pub effect_duration: Option<f64>,
    pub passive_effect_duration: Option<f64>,
}

impl CommitProfile {
    /// Export shape
    pub fn to_commit_data(&self) -> CommitData {
        CommitData {
            fiber_actual_durations: self.durations.iter().map(|d| (d.id, d.actual)).collect(),
            fiber_self_durations: self
                .durations
                .iter()
                .map(|d| (d.id, d.self_duration))
                .collect(),
            duration: self.max_actual_duration,
            priority_level: self.priority_level.clone(),
            timestamp: self.timestamp,
            effect_duration: self.effect_duration,
            passive_effect_duration: self.passive_effect_duration,
            change_descriptions: self
                .change_descriptions
                .as_ref()
                .map(|m| m.iter().map(|(id, d)| (*id, d.clone())).collect()),
        }
    }
}

// ==================== Export ====================

/// One commit, as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitData {
    pub fiber_actual_durations: Vec<(u32, f64)>,
    pub fiber_self_durations: Vec<(u32, f64)>,
    /// Longest actual duration in the commit
    pub duration: f64,
    pub priority_level: Option<String>,
    pub timestamp: f64,
    pub effect_duration: Option<f64>,
    pub passive_effect_duration: Option<f64>,
    pub change_descriptions: Option<Vec<(u32, ChangeDescription)>>,
}

/// All commits of one root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootProfilingData {
    pub root_id: u32,
    pub display_name: String,
    /// Tree base durations at the moment profiling started
    pub initial_tree_base_durations: Vec<(u32, f64)>,
    pub commit_data: Vec<CommitData>,
}

/// Result of a profiling session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilingData {
    pub renderer_id: u32,
    pub recorded_at: DateTime<Utc>,
    pub data_for_roots: Vec<RootProfilingData>,
    pub timeline: Option<TimelineData>,
}

impl ProfilingData {
    /// Data for one root
    pub fn root(&self, root_id: u32) -> Option<&RootProfilingData> {
        self.data_for_roots.iter().find(|r| r.root_id == root_id)
    }

    /// Total number of commits across roots
    pub fn commit_count(&self) -> usize {
        self.data_for_roots.iter().map(|r| r.commit_data.len()).sum()
    }
}
