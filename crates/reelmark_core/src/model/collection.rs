//! Ordered interval collection for one granularity.
//!
//! # Responsibility
//! - Sanitize untyped persisted input into typed intervals (`normalize`).
//! - Own append/close/update/delete rules for a single collection.
//!
//! # Invariants
//! - Element order is append order, never re-sorted by `start`.
//! - `append` leaves at most one open interval, and only as the last element.
//! - Update/delete targeting is by `created_at` only; unknown keys are no-ops.

use crate::clock::{Clock, Timestamp};
use crate::model::interval::{json_seconds, json_timestamp, Interval, IntervalPatch};
use serde::Serialize;
use serde_json::Value;

/// Intervals of one granularity in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IntervalCollection {
    items: Vec<Interval>,
}

impl IntervalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitizes arbitrary JSON into a collection.
    ///
    /// Rules per element:
    /// - `start` must be numeric, with legacy `time` as fallback; otherwise the
    ///   element is dropped.
    /// - `end` is kept only when numeric.
    /// - `createdAt` is kept when integral, else taken from `clock`.
    /// - `title`/`note` are kept only when strings.
    ///
    /// Non-array input yields an empty collection.
    pub fn normalize(raw: &Value, clock: &dyn Clock) -> Self {
        Self::normalize_counting_keys(raw, clock).0
    }

    /// Same as [`Self::normalize`], also returning how many intervals were
    /// given a fresh `createdAt` from `clock`.
    ///
    /// A non-zero count means the keys only exist in memory until the
    /// collection is persisted.
    pub fn normalize_counting_keys(raw: &Value, clock: &dyn Clock) -> (Self, usize) {
        let Some(elements) = raw.as_array() else {
            return (Self::new(), 0);
        };

        let mut assigned = 0;
        let items = elements
            .iter()
            .filter_map(|element| normalize_element(element, clock))
            .map(|(interval, fresh_key)| {
                assigned += usize::from(fresh_key);
                interval
            })
            .collect();
        (Self { items }, assigned)
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.items.iter()
    }

    /// Looks up one interval by identity key.
    pub fn find(&self, key: Timestamp) -> Option<&Interval> {
        self.items.iter().find(|interval| interval.created_at == key)
    }

    /// Returns the trailing interval when it is still open.
    pub fn open_interval(&self) -> Option<&Interval> {
        self.items.last().filter(|interval| interval.is_open())
    }

    /// Closes a trailing open interval at `at_time` and starts a new one there.
    ///
    /// Always grows the collection by exactly one element.
    pub fn append(&mut self, at_time: f64, created_at: Timestamp) {
        self.close_open(at_time);
        self.items.push(Interval::open_at(at_time, created_at));
    }

    /// Closes a trailing open interval at `at_time`.
    ///
    /// Returns `true` when an interval was closed.
    pub fn close_open(&mut self, at_time: f64) -> bool {
        match self.items.last_mut() {
            Some(last) if last.is_open() => {
                last.end = Some(at_time);
                true
            }
            _ => false,
        }
    }

    /// Applies `patch` to the interval keyed by `key`.
    ///
    /// Returns `false` (collection unchanged) when no interval matches.
    pub fn update_by_key(&mut self, key: Timestamp, patch: &IntervalPatch) -> bool {
        match self
            .items
            .iter_mut()
            .find(|interval| interval.created_at == key)
        {
            Some(interval) => {
                patch.apply_to(interval);
                true
            }
            None => false,
        }
    }

    /// Removes the first interval keyed by `key`, like `update_by_key`
    /// targets the first match.
    ///
    /// Returns `false` (collection unchanged) when no interval matches.
    pub fn delete_by_key(&mut self, key: Timestamp) -> bool {
        match self
            .items
            .iter()
            .position(|interval| interval.created_at == key)
        {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }
}

impl From<Vec<Interval>> for IntervalCollection {
    fn from(items: Vec<Interval>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a IntervalCollection {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Returns the interval and whether its `createdAt` came from `clock`.
fn normalize_element(element: &Value, clock: &dyn Clock) -> Option<(Interval, bool)> {
    let fields = element.as_object()?;
    // Legacy documents stored point markers under `time`.
    let start = fields
        .get("start")
        .and_then(json_seconds)
        .or_else(|| fields.get("time").and_then(json_seconds))?;

    let stored_key = fields.get("createdAt").and_then(json_timestamp);

    let interval = Interval {
        start,
        end: fields.get("end").and_then(json_seconds),
        created_at: stored_key.unwrap_or_else(|| clock.now_millis()),
        title: fields
            .get("title")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        note: fields
            .get("note")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    };
    Some((interval, stored_key.is_none()))
}
