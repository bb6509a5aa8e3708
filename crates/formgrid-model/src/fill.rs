//! Resolving a saved template against one case record.
//!
//! The document generator receives a map of cell text: every bound cell gets the
//! value of its field, with checkbox options rendered as `☑` or `☐`. A placed block
//! writes one `label: value` line per sub-field at its origin cell.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{BlockCatalog, CellAddress, FieldCatalog, FieldKey, TemplateSnapshot};

pub const CHECKED: &str = "☑";
pub const UNCHECKED: &str = "☐";

/// Text for every bound cell of `snapshot`, looked up in the case-data object `data`.
///
/// Plain fields read `data[name]`. Missing and `null` values leave the cell out.
/// Composite fields `group.option` are always rendered, checked when `data[group]`
/// names the option (a string equal to it, an array containing it, or an object with
/// a truthy entry for it), or when `data["group.option"]` is truthy.
pub fn fill_cells(snapshot: &TemplateSnapshot, data: &Value) -> BTreeMap<CellAddress, String> {
    let mut out = BTreeMap::new();
    for binding in &snapshot.bindings {
        if let Some(text) = field_text(&binding.field_key, data) {
            out.insert(binding.address, text);
        }
    }
    out
}

/// Text for every placed block of `snapshot`, keyed by the block's origin cell.
///
/// Each sub-field of the block definition becomes one `label: value` line (just
/// `label:` when the case has no value), using the catalog label when the field is
/// known. Blocks missing from `blocks` are skipped.
pub fn fill_blocks(
    snapshot: &TemplateSnapshot,
    blocks: &BlockCatalog,
    catalog: &FieldCatalog,
    data: &Value,
) -> BTreeMap<CellAddress, String> {
    let mut out = BTreeMap::new();
    for region in &snapshot.regions {
        let Some(block_id) = &region.block else {
            continue;
        };
        let Some(definition) = blocks.get(block_id.as_str()) else {
            log::warn!("no definition for block {block_id} at {}", region.origin);
            continue;
        };

        let lines: Vec<String> = definition
            .fields
            .iter()
            .map(|key| {
                let label = catalog.by_key(key).map(|f| f.label.clone()).unwrap_or_else(|_| key.to_string());
                match field_text(key, data) {
                    Some(value) if !value.is_empty() => format!("{label}: {value}"),
                    _ => format!("{label}:"),
                }
            })
            .collect();
        out.insert(region.origin, lines.join("\n"));
    }
    out
}

/// The template's static text overlaid with [`fill_cells`].
pub fn render_cells(snapshot: &TemplateSnapshot, data: &Value) -> BTreeMap<CellAddress, String> {
    let mut out = snapshot.values.clone();
    out.extend(fill_cells(snapshot, data));
    out
}

fn field_text(key: &FieldKey, data: &Value) -> Option<String> {
    match key {
        FieldKey::Plain(name) => data.get(name).and_then(scalar_text),
        FieldKey::Composite { group, option } => {
            let checked = data
                .get(key.to_string())
                .map(is_truthy)
                .unwrap_or_else(|| data.get(group).is_some_and(|v| selects(v, option)));
            Some(checkbox(checked).to_string())
        }
    }
}

pub fn checkbox(checked: bool) -> &'static str {
    if checked {
        CHECKED
    } else {
        UNCHECKED
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(checkbox(*b).to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            Some(parts.join(", "))
        }
        Value::Object(_) => None,
    }
}

fn selects(value: &Value, option: &str) -> bool {
    match value {
        Value::String(s) => s == option,
        Value::Array(items) => items.iter().any(|v| v.as_str() == Some(option)),
        Value::Object(map) => map.get(option).is_some_and(is_truthy),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Binding, BlockId, GridDimensions, RegionId, RegionSnapshot};
    use serde_json::json;

    fn snapshot(bindings: &[(&str, &str)]) -> TemplateSnapshot {
        let mut snapshot = TemplateSnapshot::empty(GridDimensions::new(20, 10));
        snapshot.bindings = bindings
            .iter()
            .map(|(a1, key)| Binding {
                address: CellAddress::from_a1(a1).unwrap(),
                field_key: FieldKey::parse(key).unwrap(),
            })
            .collect();
        snapshot
    }

    fn at<'a>(cells: &'a BTreeMap<CellAddress, String>, a1: &str) -> Option<&'a str> {
        cells.get(&CellAddress::from_a1(a1).unwrap()).map(String::as_str)
    }

    #[test]
    fn plain_fields_render_scalars() {
        let snapshot = snapshot(&[("B2", "patientName"), ("B3", "age"), ("B4", "note"), ("B5", "allergies")]);
        let data = json!({"patientName": "Ayşe Yılmaz", "age": 42, "note": null, "allergies": ["penisilin", "lateks"]});

        let cells = fill_cells(&snapshot, &data);
        assert_eq!(at(&cells, "B2"), Some("Ayşe Yılmaz"));
        assert_eq!(at(&cells, "B3"), Some("42"));
        assert_eq!(at(&cells, "B4"), None);
        assert_eq!(at(&cells, "B5"), Some("penisilin, lateks"));
    }

    #[test]
    fn composite_options_render_checkboxes() {
        let snapshot = snapshot(&[
            ("T4", "gender.erkek"),
            ("T6", "gender.kadin"),
            ("C1", "skin.soluk"),
            ("C2", "skin.terli"),
            ("D1", "pupil.normal"),
            ("E1", "callType.telsiz"),
        ]);
        let data = json!({
            "gender": "kadin",
            "skin": ["soluk"],
            "pupil": {"normal": true, "miyotik": false},
        });

        let cells = fill_cells(&snapshot, &data);
        assert_eq!(at(&cells, "T4"), Some(UNCHECKED));
        assert_eq!(at(&cells, "T6"), Some(CHECKED));
        assert_eq!(at(&cells, "C1"), Some(CHECKED));
        assert_eq!(at(&cells, "C2"), Some(UNCHECKED));
        assert_eq!(at(&cells, "D1"), Some(CHECKED));
        // Missing groups still render an empty box.
        assert_eq!(at(&cells, "E1"), Some(UNCHECKED));
    }

    #[test]
    fn dotted_key_in_data_wins() {
        let snapshot = snapshot(&[("A1", "gender.erkek")]);
        let data = json!({"gender.erkek": true, "gender": "kadin"});
        assert_eq!(at(&fill_cells(&snapshot, &data), "A1"), Some(CHECKED));
    }

    #[test]
    fn render_overlays_bound_values_on_static_text() {
        let mut snapshot = snapshot(&[("B1", "patientName")]);
        snapshot.values.insert(CellAddress::from_a1("A1").unwrap(), "Hasta:".into());
        snapshot.values.insert(CellAddress::from_a1("B1").unwrap(), "(ad soyad)".into());

        let cells = render_cells(&snapshot, &json!({"patientName": "Ali Veli"}));
        assert_eq!(at(&cells, "A1"), Some("Hasta:"));
        assert_eq!(at(&cells, "B1"), Some("Ali Veli"));
    }

    #[test]
    fn placed_blocks_write_label_value_lines_at_their_origin() {
        let blocks = BlockCatalog::from_json(
            r#"{"blocks":[{"id":"vital1","name":"Vital Bulgular 1","rowSpan":1,"colSpan":3,
                "fields":["vitalTime","pulse","gcsMotor.6"]}]}"#,
        )
        .unwrap();
        let catalog = FieldCatalog::from_json(
            r#"{"categories":[{"id":"v","name":"Vital","fields":[{"key":"pulse","label":"Nabız"}],
                "groups":[{"key":"gcsMotor","label":"GKS Motor","options":[{"key":"6","label":"6"}]}]}]}"#,
        )
        .unwrap();

        let mut snapshot = snapshot(&[]);
        snapshot.regions = vec![
            RegionSnapshot {
                id: RegionId::new(1),
                origin: CellAddress::from_a1("B2").unwrap(),
                row_span: 1,
                col_span: 3,
                block: Some(BlockId::new("vital1")),
            },
            RegionSnapshot {
                id: RegionId::new(2),
                origin: CellAddress::from_a1("A5").unwrap(),
                row_span: 2,
                col_span: 2,
                block: None,
            },
        ];

        let cells = fill_blocks(&snapshot, &blocks, &catalog, &json!({"pulse": 88, "gcsMotor": "6"}));
        assert_eq!(cells.len(), 1);
        // Unknown sub-fields fall back to their key and render without a value.
        assert_eq!(at(&cells, "B2"), Some("vitalTime:\nNabız: 88\nGKS Motor: 6: ☑"));
    }
}
