//! Annotation document aggregate.
//!
//! # Responsibility
//! - Aggregate the act/section/shot collections, notes and timestamps.
//! - Own cross-granularity cascade rules for interval creation.
//! - Validate untyped document roots into typed state.
//!
//! # Invariants
//! - Creating an interval closes open intervals at the same or finer
//!   granularity at the same time position.
//! - Update/delete never cascade outside their own collection.
//! - Unknown root fields survive a read/write cycle.

use crate::clock::{Clock, Timestamp};
use crate::model::collection::IntervalCollection;
use crate::model::interval::{json_timestamp, Granularity, IntervalPatch};
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Shape errors raised while validating a document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentShapeError {
    /// Root JSON value is not an object.
    NotAnObject,
}

impl Display for DocumentShapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "document root must be a JSON object"),
        }
    }
}

impl Error for DocumentShapeError {}

const TYPED_KEYS: [&str; 6] = ["createdAt", "updatedAt", "notes", "acts", "sections", "shots"];

/// Per-media annotation state persisted as one sidecar document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDocument {
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    /// Free-form notes. Their shape belongs to the front end.
    pub notes: Vec<Value>,
    pub acts: IntervalCollection,
    pub sections: IntervalCollection,
    pub shots: IntervalCollection,
    /// Root fields outside the typed model, written back verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationDocument {
    /// Creates an empty document.
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            created_at,
            updated_at: None,
            notes: Vec::new(),
            acts: IntervalCollection::new(),
            sections: IntervalCollection::new(),
            shots: IntervalCollection::new(),
            extra: Map::new(),
        }
    }

    /// Validates an untyped document root.
    ///
    /// Repairs instead of rejecting wherever a deterministic repair exists:
    /// non-integral `createdAt` takes the clock value, non-array `notes`
    /// becomes empty, and each collection goes through
    /// [`IntervalCollection::normalize`].
    pub fn from_value(raw: &Value, clock: &dyn Clock) -> Result<Self, DocumentShapeError> {
        Self::from_value_counting_keys(raw, clock).map(|(document, _)| document)
    }

    /// Same as [`Self::from_value`], also returning how many intervals across
    /// all collections were given a fresh `createdAt`.
    pub fn from_value_counting_keys(
        raw: &Value,
        clock: &dyn Clock,
    ) -> Result<(Self, usize), DocumentShapeError> {
        let root = raw.as_object().ok_or(DocumentShapeError::NotAnObject)?;
        let mut assigned = 0;
        let mut collection = |key: &str| match root.get(key) {
            Some(value) => {
                let (normalized, fresh) = IntervalCollection::normalize_counting_keys(value, clock);
                assigned += fresh;
                normalized
            }
            None => IntervalCollection::new(),
        };
        let acts = collection("acts");
        let sections = collection("sections");
        let shots = collection("shots");

        let extra = root
            .iter()
            .filter(|(key, _)| !TYPED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let document = Self {
            created_at: root
                .get("createdAt")
                .and_then(json_timestamp)
                .unwrap_or_else(|| clock.now_millis()),
            updated_at: root.get("updatedAt").and_then(json_timestamp),
            notes: root
                .get("notes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            acts,
            sections,
            shots,
            extra,
        };
        Ok((document, assigned))
    }

    /// Serializes into a JSON object root.
    pub fn to_value(&self) -> Value {
        // Every field serializes infallibly: string keys, finite numbers.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn collection(&self, granularity: Granularity) -> &IntervalCollection {
        match granularity {
            Granularity::Act => &self.acts,
            Granularity::Section => &self.sections,
            Granularity::Shot => &self.shots,
        }
    }

    pub fn collection_mut(&mut self, granularity: Granularity) -> &mut IntervalCollection {
        match granularity {
            Granularity::Act => &mut self.acts,
            Granularity::Section => &mut self.sections,
            Granularity::Shot => &mut self.shots,
        }
    }

    /// Starts a new interval at `at_time` and applies the cascade closure.
    ///
    /// | granularity | acts | sections | shots |
    /// |---|---|---|---|
    /// | act | append | close | close |
    /// | section | - | append | close |
    /// | shot | - | - | append |
    pub fn add_interval(&mut self, granularity: Granularity, at_time: f64, created_at: Timestamp) {
        match granularity {
            Granularity::Act => {
                self.acts.append(at_time, created_at);
                self.sections.close_open(at_time);
                self.shots.close_open(at_time);
            }
            Granularity::Section => {
                self.sections.append(at_time, created_at);
                self.shots.close_open(at_time);
            }
            Granularity::Shot => {
                self.shots.append(at_time, created_at);
            }
        }
    }

    pub fn add_act(&mut self, at_time: f64, created_at: Timestamp) {
        self.add_interval(Granularity::Act, at_time, created_at);
    }

    pub fn add_section(&mut self, at_time: f64, created_at: Timestamp) {
        self.add_interval(Granularity::Section, at_time, created_at);
    }

    pub fn add_shot(&mut self, at_time: f64, created_at: Timestamp) {
        self.add_interval(Granularity::Shot, at_time, created_at);
    }

    /// Patches one interval in its own collection. Returns whether `key` matched.
    pub fn update_interval(
        &mut self,
        granularity: Granularity,
        key: Timestamp,
        patch: &IntervalPatch,
    ) -> bool {
        self.collection_mut(granularity).update_by_key(key, patch)
    }

    /// Deletes one interval from its own collection. Returns whether `key` matched.
    pub fn delete_interval(&mut self, granularity: Granularity, key: Timestamp) -> bool {
        self.collection_mut(granularity).delete_by_key(key)
    }

    /// Shallow-merges `fields` into the document root.
    ///
    /// Merged values replace root keys wholesale. The merged root is then
    /// validated again, so typed collections keep their invariants.
    pub fn merge_patch(
        &self,
        fields: &Map<String, Value>,
        clock: &dyn Clock,
    ) -> Result<Self, DocumentShapeError> {
        let mut root = match self.to_value() {
            Value::Object(root) => root,
            _ => return Err(DocumentShapeError::NotAnObject),
        };
        for (key, value) in fields {
            root.insert(key.clone(), value.clone());
        }
        Self::from_value(&Value::Object(root), clock)
    }

    /// Stamps `updated_at`.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = Some(now);
    }
}
