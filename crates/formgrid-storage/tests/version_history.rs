use std::sync::Arc;
use std::thread;

use formgrid_model::{
    CellAddress, EngineConfig, FieldCatalog, GridDimensions, Template, TemplateSnapshot,
};
use formgrid_storage::{
    SaveOptions, Storage, StorageError, VersionOrigin, VersionStore, VersionedConfigStore,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

fn snapshot_with_rows(rows: u32) -> TemplateSnapshot {
    TemplateSnapshot::empty(GridDimensions::new(rows, 6))
}

fn check_history_semantics(store: &dyn VersionStore, id: Uuid) {
    for rows in 1..=3 {
        let saved = store.save(id, &snapshot_with_rows(rows), SaveOptions::default()).unwrap();
        assert_eq!(saved.version, rows);
        assert_eq!(saved.origin, VersionOrigin::Save);
    }

    let history = store.get_history(id, 2).unwrap();
    let versions: Vec<u32> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![3, 2]);

    let default = snapshot_with_rows(10);
    let reset = store.reset_to_default(id, &default, SaveOptions::default()).unwrap();
    assert_eq!(reset.version, 4);
    assert_eq!(reset.origin, VersionOrigin::ResetToDefault);

    // Earlier versions are untouched by the reset.
    for rows in 1..=3 {
        assert_eq!(store.get_version(id, rows).unwrap(), snapshot_with_rows(rows));
    }
    assert_eq!(store.get_version(id, 4).unwrap(), default);
    assert!(matches!(
        store.get_version(id, 5),
        Err(StorageError::NotFound { version: 5, .. })
    ));

    let latest = store.latest(id).unwrap().unwrap();
    assert_eq!(latest.version, 4);
    assert!(latest.saved_at >= history[0].saved_at);

    let err = store
        .save(id, &snapshot_with_rows(1), SaveOptions::expecting(3))
        .unwrap_err();
    assert!(matches!(err, StorageError::VersionConflict { expected: 3, actual: 4 }), "{err}");
    assert_eq!(
        store
            .save(id, &snapshot_with_rows(1), SaveOptions::expecting(4).by("Mehmet"))
            .unwrap()
            .version,
        5
    );

    let summaries = store.history_summaries(id, 10).unwrap();
    assert_eq!(summaries.len(), 5);
    assert_eq!(summaries[0].saved_by.as_deref(), Some("Mehmet"));
    assert_eq!(summaries[1].origin, VersionOrigin::ResetToDefault);
}

#[test]
fn in_memory_store_history() {
    let store = VersionedConfigStore::new();
    check_history_semantics(&store, Uuid::new_v4());
}

#[test]
fn sqlite_store_history() {
    let storage = Storage::open_in_memory().unwrap();
    let template = storage.create_template("Ambulans Vaka Formu", None).unwrap();
    check_history_semantics(&storage, template.id);
}

#[test]
fn sqlite_save_for_unknown_template_fails() {
    let storage = Storage::open_in_memory().unwrap();
    let id = Uuid::new_v4();
    assert!(matches!(
        storage.save(id, &snapshot_with_rows(1), SaveOptions::default()),
        Err(StorageError::TemplateNotFound(missing)) if missing == id
    ));
    assert!(matches!(storage.get_template(id), Err(StorageError::TemplateNotFound(_))));
}

fn concurrent_saves_get_sequential_numbers(store: Arc<dyn VersionStore>, id: Uuid) {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..5)
                    .map(|j| {
                        store
                            .save(id, &snapshot_with_rows(i * 5 + j + 1), SaveOptions::default())
                            .unwrap()
                            .version
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut versions: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=40).collect::<Vec<_>>());
}

#[test]
fn concurrent_saves_in_memory() {
    concurrent_saves_get_sequential_numbers(Arc::new(VersionedConfigStore::new()), Uuid::new_v4());
}

#[test]
fn concurrent_saves_sqlite() {
    let storage = Storage::open_in_memory().unwrap();
    let template = storage.create_template("Paralel", None).unwrap();
    concurrent_saves_get_sequential_numbers(Arc::new(storage), template.id);
}

#[test]
fn concurrent_saves_through_separate_file_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.sqlite");
    let id = Storage::open_path(&path).unwrap().create_template("Paralel", None).unwrap().id;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let path = path.clone();
            thread::spawn(move || {
                let storage = Storage::open_path(&path).unwrap();
                (0..10)
                    .map(|j| {
                        storage
                            .save(id, &snapshot_with_rows(i * 10 + j + 1), SaveOptions::default())
                            .unwrap()
                            .version
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut versions: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=40).collect::<Vec<_>>());

    let storage = Storage::open_path(&path).unwrap();
    assert_eq!(storage.latest(id).unwrap().unwrap().version, 40);
    assert_eq!(storage.get_history(id, 100).unwrap().len(), 40);
}

#[test]
fn saved_template_reloads_through_a_second_connection() {
    // A shared in-memory database lets a second handle stand in for reopening the file.
    let uri = "file:formgrid_round_trip?mode=memory&cache=shared";

    let catalog = FieldCatalog::from_json(
        r#"{"categories":[{"id":"hasta","name":"Hasta","fields":[{"key":"patientName","label":"Ad Soyad"}]}]}"#,
    )
    .unwrap();
    let config = EngineConfig::default();
    let mut template = Template::new(GridDimensions::new(10, 6), &config).unwrap();
    template
        .bind(&catalog, CellAddress::from_a1("B2").unwrap(), "patientName")
        .unwrap();

    let storage1 = Storage::open_uri(uri).unwrap();
    let meta = storage1
        .create_template("Vaka Formu", Some(serde_json::json!({"kind": "vaka"})))
        .unwrap();
    let saved = storage1
        .save(meta.id, &template.snapshot(), SaveOptions::default().by("editor"))
        .unwrap();
    template.mark_saved(saved.version);
    assert!(!template.is_dirty());

    let storage2 = Storage::open_uri(uri).unwrap();
    assert_eq!(storage2.get_template(meta.id).unwrap(), meta);
    let latest = storage2.latest(meta.id).unwrap().unwrap();
    assert_eq!(latest.saved_by.as_deref(), Some("editor"));

    let restored = Template::from_snapshot(&latest.snapshot, &catalog, &config).unwrap();
    assert_eq!(restored.bindings().to_flat_map(), template.bindings().to_flat_map());
}

#[test]
fn templates_persist_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.sqlite");

    let id = {
        let storage = Storage::open_path(&path).unwrap();
        let meta = storage.create_template("Teslim Formu", None).unwrap();
        storage.save(meta.id, &snapshot_with_rows(5), SaveOptions::default()).unwrap();
        storage.rename_template(meta.id, "Devir Teslim Formu").unwrap();
        meta.id
    };

    let storage = Storage::open_path(&path).unwrap();
    let names: Vec<String> = storage.list_templates().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Devir Teslim Formu"]);
    assert_eq!(storage.get_version(id, 1).unwrap(), snapshot_with_rows(5));
    assert!(matches!(
        storage.rename_template(Uuid::new_v4(), "x"),
        Err(StorageError::TemplateNotFound(_))
    ));
}
