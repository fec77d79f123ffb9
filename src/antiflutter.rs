// src/antiflutter.rs
//! Alert dedup / cooldown registry keyed by `(subject, level)`.
//!
//! - `None` (and `Error`) never alert.
//! - `Immediate` always alerts and refreshes its record.
//! - `Escalating` / `Concerning` alert only when there is no record for the key
//!   or the record is older than `cooldown`; at exactly `cooldown` it still suppresses.
//! - Every write prunes records older than 2× cooldown.
//!
//! Writes for one key go through the shard lock of that key only; different
//! keys do not block each other.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::assessment::{CrisisLevel, SubjectId};
use crate::clock::SharedClock;

type Key = (SubjectId, CrisisLevel);

pub struct AlertRegistry {
    records: DashMap<Key, DateTime<Utc>>,
    cooldown: Duration,
    clock: SharedClock,
}

impl AlertRegistry {
    /// Non-positive cooldowns are treated as one second.
    pub fn new(cooldown: Duration, clock: SharedClock) -> Self {
        Self {
            records: DashMap::new(),
            cooldown: cooldown.max(Duration::seconds(1)),
            clock,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Read-only check at the clock's current time.
    pub fn should_alert(&self, subject: &SubjectId, level: CrisisLevel) -> bool {
        match level {
            CrisisLevel::None | CrisisLevel::Error => false,
            CrisisLevel::Immediate => true,
            _ => {
                let now = self.clock.now();
                self.records
                    .get(&(subject.clone(), level))
                    .map_or(true, |at| now - *at > self.cooldown)
            }
        }
    }

    /// Unconditionally stamp `(subject, level)` with the current time.
    pub fn record_alert(&self, subject: &SubjectId, level: CrisisLevel) {
        if matches!(level, CrisisLevel::None | CrisisLevel::Error) {
            return;
        }
        let now = self.clock.now();
        self.records.insert((subject.clone(), level), now);
        self.prune(now);
    }

    /// Check and record in one step under the key's lock. Of several concurrent
    /// callers for the same cooled-down key, exactly one gets `true`.
    pub fn try_alert(&self, subject: &SubjectId, level: CrisisLevel) -> bool {
        if matches!(level, CrisisLevel::None | CrisisLevel::Error) {
            return false;
        }
        let now = self.clock.now();
        let fired = match self.records.entry((subject.clone(), level)) {
            Entry::Occupied(mut o) => {
                if level == CrisisLevel::Immediate || now - *o.get() > self.cooldown {
                    o.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(v) => {
                v.insert(now);
                true
            }
        };
        // entry guard is released above; retain takes every shard lock
        if fired {
            self.prune(now);
        }
        fired
    }

    fn prune(&self, now: DateTime<Utc>) {
        let horizon = self.cooldown * 2;
        let before = self.records.len();
        self.records.retain(|_, at| now - *at <= horizon);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(target: "alerts", removed, "pruned stale alert records");
        }
    }

    /// Privacy reset: drop every record.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Records still inside the cooldown window.
    pub fn active_count(&self) -> usize {
        let now = self.clock.now();
        self.records
            .iter()
            .filter(|r| now - *r.value() <= self.cooldown)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_fired(&self, subject: &SubjectId, level: CrisisLevel) -> Option<DateTime<Utc>> {
        self.records.get(&(subject.clone(), level)).map(|r| *r)
    }
}
