//! Thread-safe append-only task store shared by both orchestrators.
//!
//! Readers always get a snapshot copy; the accumulator itself never hands
//! out a reference to its internal storage.

use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::model::{task::Task, timestamp::floor_to_minute};

#[derive(Default)]
struct State {
    tasks: Vec<Task>,
    first_task_time: Option<DateTime<Utc>>,
    last_simulation_time: Option<DateTime<Utc>>,
}

pub struct TaskAccumulator {
    state: Mutex<State>,
}

impl Default for TaskAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskAccumulator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Appends one task. Sets `first_task_time` exactly once, floored to
    /// whole-minute precision.
    pub fn add(&self, task: Task) {
        let mut state = self.lock();
        if state.first_task_time.is_none() {
            state.first_task_time = Some(floor_to_minute(task.submission_time));
        }
        state.tasks.push(task);
    }

    /// A deep copy of every task added so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_task_time(&self) -> Option<DateTime<Utc>> {
        self.lock().first_task_time
    }

    pub fn last_simulation_time(&self) -> Option<DateTime<Utc>> {
        self.lock().last_simulation_time
    }

    /// `true` iff a simulation run is due at `heartbeat_time` given the
    /// configured `frequency`.
    pub fn should_simulate(&self, heartbeat_time: DateTime<Utc>, frequency: ChronoDuration) -> bool {
        let state = self.lock();
        let Some(first_task_time) = state.first_task_time else {
            return false;
        };
        match state.last_simulation_time {
            None => heartbeat_time >= first_task_time + frequency,
            Some(last) => heartbeat_time - last >= frequency,
        }
    }

    /// The next frequency-aligned cut-point.
    pub fn next_simulation_time(&self, frequency: ChronoDuration) -> Option<DateTime<Utc>> {
        let state = self.lock();
        let anchor = state.last_simulation_time.or(state.first_task_time)?;
        Some(anchor + frequency)
    }

    /// Records that a simulation ran through `simulated_time`.
    pub fn mark_simulated(&self, simulated_time: DateTime<Utc>) {
        self.lock().last_simulation_time = Some(simulated_time);
    }
}
