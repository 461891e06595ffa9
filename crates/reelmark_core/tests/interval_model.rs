use reelmark_core::{
    AnnotationDocument, Clock, Granularity, IntervalCollection, IntervalPatch, PatchField,
    Timestamp,
};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};

struct StepClock(AtomicI64);

impl StepClock {
    fn starting_at(first: Timestamp) -> Self {
        Self(AtomicI64::new(first))
    }
}

impl Clock for StepClock {
    fn now_millis(&self) -> Timestamp {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

fn open_positions(collection: &IntervalCollection) -> Vec<usize> {
    collection
        .iter()
        .enumerate()
        .filter(|(_, interval)| interval.is_open())
        .map(|(index, _)| index)
        .collect()
}

#[test]
fn repeated_appends_keep_a_single_trailing_open_interval() {
    let mut collection = IntervalCollection::new();
    // Deliberately out of order: append never sorts.
    let times = [4.0, 1.0, 9.5, 9.5, 0.0, 30.25];

    for (step, time) in times.iter().enumerate() {
        collection.append(*time, step as Timestamp);
        assert_eq!(collection.len(), step + 1);
        assert_eq!(open_positions(&collection), vec![step]);
    }

    let starts: Vec<f64> = collection.iter().map(|interval| interval.start).collect();
    assert_eq!(starts, times.to_vec());
    for pair in collection.as_slice().windows(2) {
        assert_eq!(pair[0].end, Some(pair[1].start));
    }
}

#[test]
fn append_after_closed_tail_does_not_rewrite_end() {
    let mut collection = IntervalCollection::new();
    collection.append(1.0, 1);
    collection.close_open(3.0);
    collection.append(7.0, 2);

    assert_eq!(collection.as_slice()[0].end, Some(3.0));
    assert!(collection.as_slice()[1].is_open());
}

#[test]
fn add_act_scenario_closes_previous_act() {
    let mut document = AnnotationDocument::new(0);
    document.add_act(10.0, 100);
    assert_eq!(
        serde_json::to_value(&document.acts).unwrap(),
        json!([{ "start": 10.0, "createdAt": 100 }])
    );

    document.add_act(20.0, 101);
    assert_eq!(
        serde_json::to_value(&document.acts).unwrap(),
        json!([
            { "start": 10.0, "end": 20.0, "createdAt": 100 },
            { "start": 20.0, "createdAt": 101 }
        ])
    );
}

#[test]
fn add_act_closes_open_section_and_shot_at_same_time() {
    let mut document = AnnotationDocument::new(0);
    document.add_section(2.0, 1);
    document.add_shot(3.0, 2);

    document.add_act(12.0, 3);
    assert_eq!(document.sections.as_slice()[0].end, Some(12.0));
    assert_eq!(document.shots.as_slice()[0].end, Some(12.0));
    assert_eq!(document.acts.len(), 1);
    assert!(document.acts.as_slice()[0].is_open());
    assert_eq!(document.sections.len(), 1);
    assert_eq!(document.shots.len(), 1);
}

#[test]
fn add_section_closes_shot_but_leaves_acts() {
    let mut document = AnnotationDocument::new(0);
    document.add_act(0.0, 1);
    document.add_shot(5.0, 2);
    document.add_section(8.0, 3);

    assert!(document.acts.as_slice()[0].is_open());
    assert_eq!(document.shots.as_slice()[0].end, Some(8.0));
    assert_eq!(document.sections.as_slice()[0].start, 8.0);
    assert!(document.sections.as_slice()[0].is_open());
}

#[test]
fn add_shot_only_touches_shots() {
    let mut document = AnnotationDocument::new(0);
    document.add_act(0.0, 1);
    document.add_section(1.0, 2);
    let acts = document.acts.clone();
    let sections = document.sections.clone();

    document.add_shot(5.0, 3);
    document.add_shot(6.0, 4);
    assert_eq!(document.acts, acts);
    assert_eq!(document.sections, sections);
    assert_eq!(document.shots.as_slice()[0].end, Some(6.0));
}

#[test]
fn shot_then_section_scenario() {
    let mut document = AnnotationDocument::new(0);
    document.add_shot(5.0, 1);
    assert!(document.acts.is_empty());
    assert!(document.sections.is_empty());
    assert_eq!(document.shots.as_slice()[0].start, 5.0);
    assert!(document.shots.as_slice()[0].is_open());

    document.add_section(8.0, 2);
    assert_eq!(document.shots.as_slice()[0].end, Some(8.0));
    assert_eq!(document.sections.as_slice()[0].start, 8.0);
    assert!(document.sections.as_slice()[0].is_open());
}

#[test]
fn update_and_delete_never_cascade() {
    let mut document = AnnotationDocument::new(0);
    document.add_act(0.0, 1);
    document.add_section(1.0, 2);
    document.add_shot(2.0, 3);
    let before = document.clone();

    let patch = IntervalPatch {
        end: PatchField::Set(4.0),
        ..IntervalPatch::default()
    };
    assert!(document.update_interval(Granularity::Act, 1, &patch));
    assert_eq!(document.sections, before.sections);
    assert_eq!(document.shots, before.shots);

    assert!(document.delete_interval(Granularity::Section, 2));
    assert_eq!(document.shots, before.shots);
    assert_eq!(document.acts.as_slice()[0].end, Some(4.0));
}

#[test]
fn update_tri_state_law_per_field() {
    let mut collection = IntervalCollection::new();
    collection.append(1.0, 10);
    collection.close_open(2.0);

    let set_all = IntervalPatch {
        start: Some(1.5),
        end: PatchField::Set(2.5),
        title: PatchField::Set("Cold open".to_string()),
        note: PatchField::Set("keep music".to_string()),
    };
    assert!(collection.update_by_key(10, &set_all));
    let interval = collection.find(10).unwrap().clone();
    assert_eq!(interval.start, 1.5);
    assert_eq!(interval.end, Some(2.5));
    assert_eq!(interval.title.as_deref(), Some("Cold open"));

    assert!(collection.update_by_key(10, &IntervalPatch::default()));
    assert_eq!(collection.find(10), Some(&interval));

    let clear = IntervalPatch {
        end: PatchField::Clear,
        title: PatchField::Clear,
        ..IntervalPatch::default()
    };
    assert!(collection.update_by_key(10, &clear));
    let cleared = collection.find(10).unwrap();
    assert!(cleared.is_open());
    assert_eq!(cleared.title, None);
    assert_eq!(cleared.note.as_deref(), Some("keep music"));
    assert_eq!(cleared.start, 1.5);
}

#[test]
fn invalid_typed_patch_values_are_ignored() {
    let mut collection = IntervalCollection::new();
    collection.append(1.0, 10);
    let before = collection.clone();

    let payload = json!({ "start": "3", "end": true, "title": 5, "note": {} });
    let patch = IntervalPatch::from_json_fields(payload.as_object().unwrap());
    assert!(collection.update_by_key(10, &patch));
    assert_eq!(collection, before);
}

#[test]
fn normalize_never_fabricates_start() {
    let clock = StepClock::starting_at(500);
    let raw = json!([
        { "end": 4, "createdAt": 1 },
        { "start": null, "time": null },
        { "start": true },
        { "time": 2.5, "end": 3 },
        { "start": 0 }
    ]);

    let collection = IntervalCollection::normalize(&raw, &clock);
    let starts: Vec<f64> = collection.iter().map(|interval| interval.start).collect();
    assert_eq!(starts, vec![2.5, 0.0]);

    let keys: Vec<Timestamp> = collection.iter().map(|interval| interval.created_at).collect();
    assert_eq!(keys, vec![500, 501]);
}
