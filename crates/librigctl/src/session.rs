use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rigctl_protocol::{FieldSnapshot, Snapshot, TestId};

use crate::schema::FieldSchema;

/// Lifecycle phase derived from the running flag and pause instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Running,
    Paused,
}

/// Effect of a transition, used to pick the hardware hook to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Resumed,
    Paused,
    Stopped,
    /// Precondition failed; nothing to tell the hardware.
    Unchanged,
}

/// Run/pause bookkeeping and telemetry values for one test.
///
/// Invariants: a pause instant implies `running`; when not running neither
/// instant is set. Elapsed time is never stored: resuming shifts the start
/// instant forward by the pause length instead.
#[derive(Debug, Clone)]
pub struct SessionState {
    test: TestId,
    name: String,
    running: bool,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    schema: Arc<FieldSchema>,
    fields: Vec<FieldSnapshot>,
}

impl SessionState {
    pub fn new(test: impl Into<TestId>, name: impl Into<String>, schema: Arc<FieldSchema>) -> Self {
        let fields = schema.build_fields();
        Self {
            test: test.into(),
            name: name.into(),
            running: false,
            started_at: None,
            paused_at: None,
            schema,
            fields,
        }
    }

    pub fn test(&self) -> &str {
        &self.test
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Running and not paused.
    pub fn is_active(&self) -> bool {
        self.running && self.paused_at.is_none()
    }

    pub fn phase(&self) -> Phase {
        match (self.running, self.paused_at) {
            (false, _) => Phase::Stopped,
            (true, None) => Phase::Running,
            (true, Some(_)) => Phase::Paused,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn fields(&self) -> &[FieldSnapshot] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [FieldSnapshot] {
        &mut self.fields
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Transition {
        match self.phase() {
            Phase::Stopped => {
                self.running = true;
                self.started_at = Some(now);
                self.paused_at = None;
                Transition::Started
            }
            Phase::Paused => {
                if let (Some(started), Some(paused)) = (self.started_at, self.paused_at) {
                    self.started_at = Some(started + (now - paused));
                }
                self.paused_at = None;
                Transition::Resumed
            }
            Phase::Running => Transition::Unchanged,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Transition {
        if self.phase() != Phase::Running {
            return Transition::Unchanged;
        }
        self.paused_at = Some(now);
        Transition::Paused
    }

    /// Stop the run and reset every field to its zero value.
    ///
    /// The reset happens even when already stopped; only the reported
    /// transition depends on the previous phase.
    pub fn stop(&mut self) -> Transition {
        let was_running = self.running;
        self.running = false;
        self.started_at = None;
        self.paused_at = None;
        self.schema.reset(&mut self.fields);
        if was_running {
            Transition::Stopped
        } else {
            Transition::Unchanged
        }
    }

    /// Run time excluding pauses; zero when stopped.
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        match (self.running, self.started_at) {
            (true, Some(started)) => self.paused_at.unwrap_or(now) - started,
            _ => TimeDelta::zero(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            running: self.running,
            paused: self.is_paused(),
            name: self.name.clone(),
            test: self.test.clone(),
            fields: self.fields.clone(),
            start_time: self
                .started_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}
