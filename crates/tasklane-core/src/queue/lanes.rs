//! PriorityQueueSet - 優先度ごとの bounded FIFO
//!
//! キューには `TaskId` だけを載せる。レコード本体は TaskStore が持つ。
//! lane ごとに Mutex と Notify を分けているので、ある lane の混雑が
//! 他の lane の push/pop を待たせることはない。

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{Priority, TaskId};

/// Maximum queued ids per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneCapacities {
    pub urgent: usize,
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl Default for LaneCapacities {
    fn default() -> Self {
        Self {
            urgent: 100,
            critical: 200,
            high: 500,
            normal: 1000,
            low: 2000,
        }
    }
}

impl LaneCapacities {
    pub fn for_priority(&self, priority: Priority) -> usize {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("{priority} lane is full (capacity {capacity})")]
    Full { priority: Priority, capacity: usize },
}

#[derive(Default)]
struct LaneState {
    items: VecDeque<TaskId>,
    members: HashSet<TaskId>,
}

struct Lane {
    priority: Priority,
    capacity: usize,
    state: Mutex<LaneState>,
    notify: Notify,
}

impl Lane {
    fn new(priority: Priority, capacity: usize) -> Self {
        Self {
            priority,
            capacity,
            state: Mutex::new(LaneState::default()),
            notify: Notify::new(),
        }
    }
}

pub struct PriorityQueueSet {
    lanes: Vec<Lane>,
}

impl PriorityQueueSet {
    pub fn new(capacities: LaneCapacities) -> Self {
        let lanes = Priority::ALL
            .iter()
            .map(|&p| Lane::new(p, capacities.for_priority(p)))
            .collect();
        Self { lanes }
    }

    fn lane(&self, priority: Priority) -> &Lane {
        &self.lanes[priority.index()]
    }

    /// Append `id` to its lane.
    ///
    /// `Ok(false)` when the id is already queued, `Err(Full)` when the lane is
    /// at capacity. Never blocks.
    pub async fn try_push(&self, priority: Priority, id: TaskId) -> Result<bool, QueueError> {
        let lane = self.lane(priority);
        {
            let mut state = lane.state.lock().await;
            if state.members.contains(&id) {
                return Ok(false);
            }
            if state.items.len() >= lane.capacity {
                return Err(QueueError::Full {
                    priority: lane.priority,
                    capacity: lane.capacity,
                });
            }
            state.items.push_back(id);
            state.members.insert(id);
        }
        lane.notify.notify_one();
        Ok(true)
    }

    /// Take the oldest id of `priority`, waiting at most `wait` for one.
    pub async fn pop(&self, priority: Priority, wait: Duration) -> Option<TaskId> {
        let lane = self.lane(priority);
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut state = lane.state.lock().await;
                if let Some(id) = state.items.pop_front() {
                    state.members.remove(&id);
                    return Some(id);
                }
            }
            // notify_one は waiter がいなければ permit を残すので取りこぼさない
            if tokio::time::timeout_at(deadline, lane.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    pub async fn contains(&self, id: TaskId) -> bool {
        for lane in &self.lanes {
            if lane.state.lock().await.members.contains(&id) {
                return true;
            }
        }
        false
    }

    pub async fn len(&self, priority: Priority) -> usize {
        self.lane(priority).state.lock().await.items.len()
    }

    pub async fn depths(&self) -> BTreeMap<Priority, usize> {
        let mut depths = BTreeMap::new();
        for lane in &self.lanes {
            depths.insert(lane.priority, lane.state.lock().await.items.len());
        }
        depths
    }
}

impl Default for PriorityQueueSet {
    fn default() -> Self {
        Self::new(LaneCapacities::default())
    }
}
