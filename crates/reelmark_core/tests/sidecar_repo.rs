use reelmark_core::{
    AnnotationDocument, DocumentLoad, DocumentRepository, FsDocumentRepository, Granularity,
    IntervalPatch, PatchField, RepoError, SidecarConfig, SystemClock,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn repo() -> FsDocumentRepository {
    FsDocumentRepository::new(SidecarConfig::default(), Arc::new(SystemClock::new()))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn sidecar_path_sits_next_to_media() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("Episode 1: Pilot?.mov");

    let sidecar = repo().sidecar_path(&media).unwrap();
    assert_eq!(sidecar, dir.path().join("Episode 1_ Pilot_.json"));
}

#[test]
fn sidecar_path_rejects_media_without_file_name() {
    let err = repo().sidecar_path(Path::new("/")).unwrap_err();
    assert!(matches!(err, RepoError::InvalidMediaPath(_)));
    assert_eq!(err.code(), "invalid_media_path");
}

#[test]
fn init_creates_directory_and_default_document() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("nested/deeper/clip.json");
    let repo = repo();

    assert!(repo.init(&sidecar).unwrap());
    let stored = read_json(&sidecar);
    assert!(stored["createdAt"].is_i64());
    for key in ["notes", "acts", "sections", "shots"] {
        assert_eq!(stored[key], json!([]), "{key}");
    }
    assert!(stored.get("updatedAt").is_none());
}

#[test]
fn init_never_overwrites_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    std::fs::write(&sidecar, r#"{"createdAt":1,"notes":["keep"]}"#).unwrap();

    let repo = repo();
    assert!(!repo.init(&sidecar).unwrap());
    assert!(!repo.init(&sidecar).unwrap());
    assert_eq!(read_json(&sidecar)["notes"], json!(["keep"]));
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    let repo = repo();

    let mut document = AnnotationDocument::new(1_700_000_000_000);
    document.add_act(0.0, 1_700_000_000_001);
    document.add_section(1.25, 1_700_000_000_002);
    document.add_shot(2.5, 1_700_000_000_003);
    document.add_act(60.0, 1_700_000_000_004);
    let patch = IntervalPatch {
        title: PatchField::Set("Intro".to_string()),
        note: PatchField::Set("line 1\nline 2 \"quoted\"".to_string()),
        ..IntervalPatch::default()
    };
    document.update_interval(Granularity::Act, 1_700_000_000_001, &patch);
    document.notes = vec![json!({ "text": "check audio", "at": 12.5 })];
    document.extra.insert("timebase".to_string(), json!({ "fps": 24, "dropFrame": false }));
    document.touch(1_700_000_000_010);

    repo.write(&sidecar, &document).unwrap();
    assert_eq!(repo.read(&sidecar), DocumentLoad::Found(document));
}

#[test]
fn write_replaces_whole_document() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    std::fs::write(&sidecar, r#"{"createdAt":1,"notes":[],"acts":[{"start":1,"createdAt":2}]}"#)
        .unwrap();

    let repo = repo();
    repo.write(&sidecar, &AnnotationDocument::new(5)).unwrap();
    let stored = read_json(&sidecar);
    assert_eq!(stored["createdAt"], json!(5));
    assert_eq!(stored["acts"], json!([]));
}

#[test]
fn read_repairs_legacy_and_partial_documents() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    std::fs::write(
        &sidecar,
        r#"{"createdAt":1,"notes":[],"acts":[{"time":3,"createdAt":9},{"label":"junk"}]}"#,
    )
    .unwrap();

    let document = repo().read(&sidecar).into_document().unwrap();
    assert_eq!(document.acts.len(), 1);
    assert_eq!(document.acts.as_slice()[0].start, 3.0);
    assert_eq!(document.acts.as_slice()[0].created_at, 9);
    assert!(document.sections.is_empty());
}

#[test]
fn corrupt_document_reads_as_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    std::fs::write(&sidecar, "\"just a string\"").unwrap();

    assert!(matches!(repo().read(&sidecar), DocumentLoad::Unreadable(_)));
    assert_eq!(repo().read(&sidecar).into_document(), None);
}

#[test]
fn compact_config_writes_single_line() {
    let dir = tempfile::tempdir().unwrap();
    let sidecar = dir.path().join("clip.json");
    let config = SidecarConfig::new("json", '_', false).unwrap();
    let repo = FsDocumentRepository::new(config, Arc::new(SystemClock::new()));

    repo.write(&sidecar, &AnnotationDocument::new(3)).unwrap();
    let text = std::fs::read_to_string(&sidecar).unwrap();
    assert!(!text.contains('\n'));
}
