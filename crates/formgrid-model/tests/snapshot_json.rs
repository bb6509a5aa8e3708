use std::collections::BTreeMap;

use formgrid_model::{
    fill_cells, BlockCatalog, CellAddress, EngineConfig, FieldCatalog, GridDimensions, Rect, Template,
    TemplateError, TemplateSnapshot, SCHEMA_VERSION,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn catalog() -> FieldCatalog {
    FieldCatalog::from_json(include_str!("fixtures/catalog.json")).unwrap()
}

fn cell(a1: &str) -> CellAddress {
    CellAddress::from_a1(a1).unwrap()
}

fn sample() -> Template {
    let catalog = catalog();
    let blocks = BlockCatalog::load(include_str!("fixtures/blocks.json"), &catalog).unwrap();
    let mut template = Template::new(GridDimensions::new(10, 6), &EngineConfig::default()).unwrap();
    template.merge(Rect::from_a1("A1:F1").unwrap()).unwrap();
    template.set_value(cell("A1"), "AMBULANS VAKA FORMU").unwrap();
    template.place_block(&blocks, "vital1", cell("B3")).unwrap();
    template.bind(&catalog, cell("B3"), "vitalBlock").unwrap();
    template.bind(&catalog, cell("A2"), "patientName").unwrap();
    template.bind(&catalog, cell("E4"), "gender.erkek").unwrap();
    template.set_style_attributes(json!({"A1": {"bold": true}}));
    template
}

#[test]
fn snapshot_serializes_bindings_as_a_flat_map() {
    let snapshot = sample().snapshot();
    let value = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(
        value["bindings"],
        json!({"A2": "patientName", "B3": "vitalBlock", "E4": "gender.erkek"})
    );
    assert_eq!(value["dimensions"], json!({"rows": 10, "columns": 6}));
    assert_eq!(value["schemaVersion"], json!(SCHEMA_VERSION));
    assert_eq!(
        value["regions"],
        json!([
            {"id": 1, "origin": "A1", "rowSpan": 1, "colSpan": 6},
            {"id": 2, "origin": "B3", "rowSpan": 1, "colSpan": 3, "block": "vital1"}
        ])
    );
    assert_eq!(value["values"], json!({"A1": "AMBULANS VAKA FORMU"}));
}

#[test]
fn snapshot_restores_an_equivalent_template() {
    let original = sample();
    let json = original.snapshot().to_json().unwrap();

    let parsed = TemplateSnapshot::from_json(&json).unwrap();
    let restored = Template::from_snapshot(&parsed, &catalog(), &EngineConfig::default()).unwrap();

    assert_eq!(restored.snapshot(), original.snapshot());
    assert_eq!(restored.bindings().to_flat_map(), original.bindings().to_flat_map());
    assert_eq!(restored.placements().len(), 1);
}

#[test]
fn restore_revalidates_against_the_catalog() {
    let mut snapshot = sample().snapshot();
    snapshot.bindings[0].field_key = formgrid_model::FieldKey::parse("retired").unwrap();

    let err = Template::from_snapshot(&snapshot, &catalog(), &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, TemplateError::Bind(_)), "{err}");
}

#[test]
fn legacy_snapshot_without_schema_or_values_loads() {
    let snapshot = TemplateSnapshot::from_json(
        r#"{"dimensions":{"rows":3,"columns":3},"regions":[],"bindings":{"C3":"pulse"},"styleAttributes":null}"#,
    )
    .unwrap();
    assert_eq!(snapshot.schema_version, 1);
    assert!(snapshot.values.is_empty());

    let template = Template::from_snapshot(&snapshot, &catalog(), &EngineConfig::default()).unwrap();
    assert_eq!(template.bindings().len(), 1);
}

#[test]
fn newer_schema_is_refused() {
    let mut snapshot = TemplateSnapshot::empty(GridDimensions::new(2, 2));
    snapshot.schema_version = SCHEMA_VERSION + 1;
    assert!(matches!(
        Template::from_snapshot(&snapshot, &catalog(), &EngineConfig::default()),
        Err(TemplateError::UnsupportedSchema(_))
    ));
}

#[test]
fn filled_snapshot_feeds_the_document_generator() {
    let snapshot = sample().snapshot();
    let cells = fill_cells(
        &snapshot,
        &json!({"patientName": "Ayşe Yılmaz", "vitalBlock": "12:30 120/80 88", "gender": "kadin"}),
    );

    let expected: BTreeMap<CellAddress, String> = [
        ("A2", "Ayşe Yılmaz"),
        ("B3", "12:30 120/80 88"),
        ("E4", "☐"),
    ]
    .into_iter()
    .map(|(a, v)| (cell(a), v.to_string()))
    .collect();
    assert_eq!(cells, expected);
}
