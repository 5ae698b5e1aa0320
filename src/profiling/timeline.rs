//! Timeline span recorder
//!
//! The host reports render, commit and effect phases as start/stop marks.
//! They nest, so the recorder keeps a stack and gives each measure a depth:
//! the parent's depth plus one, except below a `render-idle` span, which
//! never adds a level. That is enough for a flame chart without the recorder
//! knowing anything about layout.
//!
//! Mismatched stops are logged and tolerated; the timeline is diagnostics
//! and must never take the host down.

use crate::scheduler::{as_millis_f64, SharedClock};
use serde::{Deserialize, Serialize};

/// Phase a measure covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureType {
    RenderIdle,
    Render,
    Commit,
    LayoutEffects,
    PassiveEffects,
}

/// One span on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    #[serde(rename = "type")]
    pub kind: MeasureType,
    pub batch_uid: u32,
    pub depth: u32,
    /// Lane bit positions
    pub lanes: Vec<u32>,
    pub timestamp: f64,
    pub duration: f64,
}

/// What a component measure covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentMeasureType {
    Render,
    LayoutEffectMount,
    LayoutEffectUnmount,
    PassiveEffectMount,
    PassiveEffectUnmount,
}

/// Time spent in one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMeasure {
    #[serde(rename = "type")]
    pub kind: ComponentMeasureType,
    pub component_name: String,
    pub timestamp: f64,
    pub duration: f64,
}

/// What got scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingEventType {
    ScheduleRender,
    ScheduleStateUpdate,
    ScheduleForceUpdate,
}

/// Work scheduled by the host or a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingEvent {
    #[serde(rename = "type")]
    pub kind: SchedulingEventType,
    pub component_name: Option<String>,
    pub lanes: Vec<u32>,
    pub timestamp: f64,
}

/// Everything captured between profiling start and stop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    /// Milliseconds on the session clock when recording started
    pub start_time: f64,
    pub duration: f64,
    /// Label per lane bit, index = bit position
    pub lane_labels: Vec<String>,
    pub measures: Vec<Measure>,
    pub component_measures: Vec<ComponentMeasure>,
    pub scheduling_events: Vec<SchedulingEvent>,
}

impl TimelineData {
    /// Measures belonging to one batch
    pub fn batch(&self, batch_uid: u32) -> impl Iterator<Item = &Measure> {
        self.measures.iter().filter(move |m| m.batch_uid == batch_uid)
    }
}

/// Bit positions set in a lane mask
pub fn lanes_to_array(lanes: u32) -> Vec<u32> {
    (0..32).filter(|bit| lanes & (1 << bit) != 0).collect()
}

/// Nested span recorder
pub struct TimelineRecorder {
    clock: SharedClock,
    recording: bool,
    origin: f64,
    batch_uid: u32,
    next_render_starts_new_batch: bool,
    /// Indices into `data.measures` of the open spans
    stack: Vec<usize>,
    open_component: Option<ComponentMeasure>,
    data: TimelineData,
}

impl std::fmt::Debug for TimelineRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineRecorder")
            .field("recording", &self.recording)
            .field("batch_uid", &self.batch_uid)
            .field("open", &self.stack.len())
            .field("measures", &self.data.measures.len())
            .finish()
    }
}

impl TimelineRecorder {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            recording: false,
            origin: 0.0,
            batch_uid: 0,
            next_render_starts_new_batch: true,
            stack: Vec::new(),
            open_component: None,
            data: TimelineData::default(),
        }
    }

    /// Start a fresh recording
    pub fn start(&mut self, lane_labels: Vec<String>) {
        let now = self.now();
        self.recording = true;
        self.origin = now;
        self.batch_uid = 0;
        self.next_render_starts_new_batch = true;
        self.stack.clear();
        self.open_component = None;
        self.data = TimelineData {
            start_time: now,
            lane_labels,
            ..TimelineData::default()
        };
    }

    /// Stop recording; the data stays available
    pub fn stop(&mut self) {
        if self.recording {
            self.data.duration = self.relative();
        }
        self.recording = false;
        self.stack.clear();
        self.open_component = None;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Data captured by the last recording
    pub fn data(&self) -> &TimelineData {
        &self.data
    }

    /// Depth of the innermost open span, if any
    pub fn open_spans(&self) -> usize {
        self.stack.len()
    }

    // --- Phase marks ---

    pub fn mark_render_started(&mut self, lanes: u32) {
        if !self.recording {
            return;
        }
        if self.next_render_starts_new_batch {
            self.next_render_starts_new_batch = false;
            self.batch_uid += 1;
        }
        if self.top_kind() != Some(MeasureType::RenderIdle) {
            self.push(MeasureType::RenderIdle, lanes);
        }
        self.push(MeasureType::Render, lanes);
    }

    pub fn mark_render_yielded(&mut self) {
        self.pop(MeasureType::Render);
    }

    pub fn mark_render_stopped(&mut self) {
        self.pop(MeasureType::Render);
    }

    pub fn mark_commit_started(&mut self, lanes: u32) {
        if !self.recording {
            return;
        }
        self.push(MeasureType::Commit, lanes);
        self.next_render_starts_new_batch = true;
    }

    pub fn mark_commit_stopped(&mut self) {
        self.pop(MeasureType::Commit);
        self.pop(MeasureType::RenderIdle);
    }

    pub fn mark_layout_effects_started(&mut self, lanes: u32) {
        if self.recording {
            self.push(MeasureType::LayoutEffects, lanes);
        }
    }

    pub fn mark_layout_effects_stopped(&mut self) {
        self.pop(MeasureType::LayoutEffects);
    }

    pub fn mark_passive_effects_started(&mut self, lanes: u32) {
        if self.recording {
            self.push(MeasureType::PassiveEffects, lanes);
        }
    }

    pub fn mark_passive_effects_stopped(&mut self) {
        self.pop(MeasureType::PassiveEffects);
    }

    // --- Component marks ---

    pub fn mark_component_started(&mut self, kind: ComponentMeasureType, component_name: String) {
        if !self.recording {
            return;
        }
        self.open_component = Some(ComponentMeasure {
            kind,
            component_name,
            timestamp: self.relative(),
            duration: 0.0,
        });
    }

    pub fn mark_component_stopped(&mut self) {
        if let Some(mut measure) = self.open_component.take() {
            measure.duration = self.relative() - measure.timestamp;
            self.data.component_measures.push(measure);
        }
    }

    // --- Scheduling ---

    pub fn mark_render_scheduled(&mut self, lanes: u32) {
        self.schedule(SchedulingEventType::ScheduleRender, None, lanes);
    }

    pub fn mark_state_update_scheduled(&mut self, component_name: String, lanes: u32) {
        self.schedule(
            SchedulingEventType::ScheduleStateUpdate,
            Some(component_name),
            lanes,
        );
    }

    pub fn mark_force_update_scheduled(&mut self, component_name: String, lanes: u32) {
        self.schedule(
            SchedulingEventType::ScheduleForceUpdate,
            Some(component_name),
            lanes,
        );
    }

    // --- Internals ---

    fn now(&self) -> f64 {
        as_millis_f64(self.clock.now())
    }

    fn relative(&self) -> f64 {
        self.now() - self.origin
    }

    fn top_kind(&self) -> Option<MeasureType> {
        self.stack.last().map(|&i| self.data.measures[i].kind)
    }

    fn push(&mut self, kind: MeasureType, lanes: u32) {
        let depth = match self.stack.last() {
            Some(&i) => {
                let top = &self.data.measures[i];
                if top.kind == MeasureType::RenderIdle {
                    top.depth
                } else {
                    top.depth + 1
                }
            }
            None => 0,
        };
        let measure = Measure {
            kind,
            batch_uid: self.batch_uid,
            depth,
            lanes: lanes_to_array(lanes),
            timestamp: self.relative(),
            duration: 0.0,
        };
        self.data.measures.push(measure);
        self.stack.push(self.data.measures.len() - 1);
    }

    fn pop(&mut self, expected: MeasureType) {
        if !self.recording {
            return;
        }
        let now = self.relative();
        let Some(i) = self.stack.pop() else {
            tracing::warn!(
                "Timeline: {:?} completed at {:.3}ms with no open span",
                expected,
                now
            );
            return;
        };
        let top = &mut self.data.measures[i];
        if top.kind != expected {
            tracing::warn!(
                "Timeline: {:?} completed at {:.3}ms before {:?} completed",
                expected,
                now,
                top.kind
            );
        }
        top.duration = now - top.timestamp;
        self.data.duration = now;
    }

    fn schedule(&mut self, kind: SchedulingEventType, component_name: Option<String>, lanes: u32) {
        if !self.recording {
            return;
        }
        let timestamp = self.relative();
        self.data.scheduling_events.push(SchedulingEvent {
            kind,
            component_name,
            lanes: lanes_to_array(lanes),
            timestamp,
        });
    }
}
