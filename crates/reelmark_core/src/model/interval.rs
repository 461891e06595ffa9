//! Interval value type and partial-update shapes.
//!
//! # Responsibility
//! - Define the atomic time-range record shared by acts, sections and shots.
//! - Model partial updates with three-valued fields (unset / clear / set).
//!
//! # Invariants
//! - `created_at` is the identity key and is never rewritten by a patch.
//! - `end == None` means the interval is still open.
//! - `start`/`end` are always finite.

use crate::clock::Timestamp;
use serde::Serialize;
use serde_json::{Map, Value};

/// Annotation granularity. Each one owns an independent collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Coarse story unit.
    Act,
    /// Mid-level unit inside an act.
    Section,
    /// Fine-grained camera unit.
    Shot,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Self::Act, Self::Section, Self::Shot];

    /// Document root key holding this granularity's collection.
    pub fn collection_key(self) -> &'static str {
        match self {
            Self::Act => "acts",
            Self::Section => "sections",
            Self::Shot => "shots",
        }
    }

    /// Short label used in log events.
    pub fn label(self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::Section => "section",
            Self::Shot => "shot",
        }
    }
}

/// One time range on the media timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Start position in seconds.
    pub start: f64,
    /// End position in seconds. `None` while the interval is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// Identity key, epoch milliseconds at creation.
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Interval {
    /// Creates an open interval starting at `start`.
    pub fn open_at(start: f64, created_at: Timestamp) -> Self {
        Self {
            start,
            end: None,
            created_at,
            title: None,
            note: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Three-valued patch field.
///
/// `Unset` leaves the target alone, `Clear` removes it, `Set` replaces it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PatchField<T> {
    /// Field was not provided.
    #[default]
    Unset,
    /// Field was provided as an explicit `null`.
    Clear,
    /// Field was provided with a valid value.
    Set(T),
}

impl<T> PatchField<T> {
    /// Reads a field from an untyped payload.
    ///
    /// Values rejected by `extract` collapse to `Unset`, never to `Clear`.
    pub fn from_json(value: Option<&Value>, extract: impl FnOnce(&Value) -> Option<T>) -> Self {
        match value {
            None => Self::Unset,
            Some(Value::Null) => Self::Clear,
            Some(other) => extract(other).map_or(Self::Unset, Self::Set),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Applies this field to an optional target slot.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Self::Unset => {}
            Self::Clear => *target = None,
            Self::Set(value) => *target = Some(value),
        }
    }
}

/// Partial update for one interval.
///
/// `start` is required on every interval, so it only has two states: an
/// explicit `null` is treated as not provided.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalPatch {
    pub start: Option<f64>,
    pub end: PatchField<f64>,
    pub title: PatchField<String>,
    pub note: PatchField<String>,
}

impl IntervalPatch {
    /// Builds a patch from the optional fields of an update payload.
    ///
    /// Wrong-typed values are ignored.
    pub fn from_json_fields(fields: &Map<String, Value>) -> Self {
        Self {
            start: fields.get("start").and_then(json_seconds),
            end: PatchField::from_json(fields.get("end"), json_seconds),
            title: PatchField::from_json(fields.get("title"), json_string),
            note: PatchField::from_json(fields.get("note"), json_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_unset() && self.title.is_unset() && self.note.is_unset()
    }

    /// Applies every provided field to `interval`. `created_at` is untouched.
    pub fn apply_to(&self, interval: &mut Interval) {
        if let Some(start) = self.start {
            interval.start = start;
        }
        self.end.clone().apply_to(&mut interval.end);
        self.title.clone().apply_to(&mut interval.title);
        self.note.clone().apply_to(&mut interval.note);
    }
}

/// Reads a finite number of seconds.
pub(crate) fn json_seconds(value: &Value) -> Option<f64> {
    value.as_f64().filter(|seconds| seconds.is_finite())
}

/// Reads an integral epoch-millisecond timestamp.
///
/// Floats are accepted only when they carry no fractional part.
pub(crate) fn json_timestamp(value: &Value) -> Option<Timestamp> {
    if let Some(millis) = value.as_i64() {
        return Some(millis);
    }
    let float = value.as_f64()?;
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    if float.is_finite() && float.fract() == 0.0 && in_range {
        Some(float as i64)
    } else {
        None
    }
}

fn json_string(value: &Value) -> Option<String> {
    value.as_str().map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::{json_timestamp, Interval, IntervalPatch, PatchField};
    use serde_json::json;

    #[test]
    fn patch_field_distinguishes_missing_null_and_value() {
        let payload = json!({ "end": null, "title": "Opening" });
        let fields = payload.as_object().unwrap();

        let patch = IntervalPatch::from_json_fields(fields);
        assert_eq!(patch.start, None);
        assert_eq!(patch.end, PatchField::Clear);
        assert_eq!(patch.title, PatchField::Set("Opening".to_string()));
        assert_eq!(patch.note, PatchField::Unset);
    }

    #[test]
    fn patch_ignores_wrong_typed_values() {
        let payload = json!({ "start": "12", "end": "soon", "title": 4, "note": [1] });
        let patch = IntervalPatch::from_json_fields(payload.as_object().unwrap());
        assert!(patch.is_empty());
    }

    #[test]
    fn null_start_is_not_a_clear() {
        let payload = json!({ "start": null });
        let patch = IntervalPatch::from_json_fields(payload.as_object().unwrap());
        assert_eq!(patch.start, None);
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_clears_optional_fields_and_keeps_identity() {
        let mut interval = Interval {
            start: 1.0,
            end: Some(2.0),
            created_at: 77,
            title: Some("t".to_string()),
            note: Some("n".to_string()),
        };
        let patch = IntervalPatch {
            start: Some(1.5),
            end: PatchField::Clear,
            title: PatchField::Clear,
            note: PatchField::Unset,
        };

        patch.apply_to(&mut interval);
        assert_eq!(interval.start, 1.5);
        assert!(interval.is_open());
        assert_eq!(interval.title, None);
        assert_eq!(interval.note.as_deref(), Some("n"));
        assert_eq!(interval.created_at, 77);
    }

    #[test]
    fn timestamps_must_be_integral() {
        assert_eq!(json_timestamp(&json!(1_700_000_000_000_i64)), Some(1_700_000_000_000));
        assert_eq!(json_timestamp(&json!(42.0)), Some(42));
        assert_eq!(json_timestamp(&json!(42.5)), None);
        assert_eq!(json_timestamp(&json!("42")), None);
    }

    #[test]
    fn serialization_omits_open_end_and_missing_text() {
        let json = serde_json::to_value(Interval::open_at(3.0, 9)).unwrap();
        assert_eq!(json, json!({ "start": 3.0, "createdAt": 9 }));
    }
}
