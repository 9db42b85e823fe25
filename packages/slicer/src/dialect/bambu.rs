use serde_json::Value;

use super::{
    DialectError, DialectParser, application_marker, element_attr, element_fragments,
    metadata_value,
};
use crate::container::Archive;
use crate::filament::{self, Filament};
use crate::profile::{ParsedProfile, ProfileMetadata, SlicerKind};
use crate::timefmt::parse_print_duration;

pub(super) const PROJECT_SETTINGS: &str = "Metadata/project_settings.config";
pub(super) const SLICE_INFO: &str = "Metadata/slice_info.config";
const PLATE_THUMBNAIL: &str = "Metadata/plate_1.png";

/// Bambu Studio dialect. Settings live in a JSON project file; per-plate
/// slicing results (time, weight, filament usage) in `slice_info.config`.
pub struct BambuParser;

impl DialectParser for BambuParser {
    fn kind(&self) -> SlicerKind {
        SlicerKind::Bambu
    }

    fn can_parse(&self, archive: &Archive) -> bool {
        if !archive.contains(PROJECT_SETTINGS) {
            return false;
        }
        if let Some(app) = application_marker(archive) {
            return app.to_lowercase().contains("bambustudio");
        }
        // No application marker: fall back to a settings fingerprint.
        archive
            .entry_utf8(PROJECT_SETTINGS)
            .is_some_and(|s| s.to_lowercase().contains("bambu"))
    }

    fn parse(&self, archive: &Archive) -> Result<ParsedProfile, DialectError> {
        parse_family(archive, SlicerKind::Bambu)
    }
}

/// Shared extraction for the Bambu container family. OrcaSlicer is a Bambu
/// Studio fork and writes the same layout, so both dialects funnel here and
/// differ only in detection and the resulting tag.
pub(super) fn parse_family(
    archive: &Archive,
    kind: SlicerKind,
) -> Result<ParsedProfile, DialectError> {
    let raw = archive
        .entry_utf8(PROJECT_SETTINGS)
        .ok_or_else(|| DialectError::MissingEntry(PROJECT_SETTINGS.into()))?;
    let settings: Value = serde_json::from_str(&raw)
        .map_err(|e| DialectError::Config(format!("{PROJECT_SETTINGS}: {e}")))?;

    let printer_name = string_field(&settings, "printer_model")
        .or_else(|| string_field(&settings, "printer_settings_id"));
    let mut profile = ParsedProfile::new(kind, printer_name);

    profile.metadata = ProfileMetadata {
        layer_height_mm: float_field(&settings, "layer_height"),
        infill_percent: percent_field(&settings, "sparse_infill_density"),
        nozzle_temp_c: int_list_head(&settings, "nozzle_temperature"),
        bed_temp_c: [
            "hot_plate_temp",
            "textured_plate_temp",
            "cool_plate_temp",
            "eng_plate_temp",
        ]
        .iter()
        .find_map(|key| int_list_head(&settings, key)),
        ..ProfileMetadata::default()
    };

    let types = string_list(&settings, "filament_type");
    let colours = string_list(&settings, "filament_colour");
    let mut filaments: Vec<Filament> = types
        .iter()
        .enumerate()
        .map(|(i, material)| Filament {
            material: material.clone(),
            color: colours.get(i).cloned(),
            used_grams: None,
        })
        .collect();

    if let Some(info) = archive.entry_utf8(SLICE_INFO) {
        profile.metadata.print_time_seconds =
            metadata_value(&info, "prediction").and_then(|v| parse_print_duration(&v));
        profile.metadata.filament_weight_grams =
            metadata_value(&info, "weight").and_then(|v| v.parse().ok());

        let copies = element_fragments(&info, "object").len();
        if copies > 0 {
            profile.metadata.plate_copies = Some(copies as u32);
        }

        // Sliced filament usage is more precise than the settings list.
        let reported: Vec<Filament> = element_fragments(&info, "filament")
            .iter()
            .filter_map(|fragment| {
                Some(Filament {
                    material: element_attr(fragment, "type")?,
                    color: element_attr(fragment, "color"),
                    used_grams: element_attr(fragment, "used_g").and_then(|g| g.parse().ok()),
                })
            })
            .collect();
        if !reported.is_empty() {
            filaments = reported;
        }
    }

    profile.metadata.filament_summary = filament::summarize(&filaments);
    if profile.metadata.filament_weight_grams.is_none() {
        profile.metadata.filament_weight_grams = filament::total_weight_grams(&filaments);
    }
    profile.thumbnail = archive.entry(PLATE_THUMBNAIL).map(<[u8]>::to_vec);

    Ok(profile)
}

/// Bambu settings values arrive as strings, arrays of strings, or numbers
/// depending on the field and exporter version; these helpers absorb that.
fn string_field(settings: &Value, key: &str) -> Option<String> {
    match settings.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn float_field(settings: &Value, key: &str) -> Option<f64> {
    match settings.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        Value::Array(items) => match items.first()? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        },
        _ => None,
    }
}

fn percent_field(settings: &Value, key: &str) -> Option<f64> {
    string_field(settings, key)
        .and_then(|s| s.trim_end_matches('%').trim().parse().ok())
        .or_else(|| float_field(settings, key))
}

fn int_list_head(settings: &Value, key: &str) -> Option<i32> {
    float_field(settings, key).map(|v| v.round() as i32)
}

fn string_list(settings: &Value, key: &str) -> Vec<String> {
    match settings.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn archive_of(entries: &[(&str, &[u8])]) -> Archive {
        Archive::from_entries(
            entries
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_vec()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    const MODEL_XML: &str =
        r#"<model><metadata name="Application">BambuStudio-01.08.00.57</metadata></model>"#;

    const SETTINGS_JSON: &str = r##"{
        "printer_model": "Bambu Lab X1 Carbon",
        "printer_settings_id": "Bambu Lab X1 Carbon 0.4 nozzle",
        "layer_height": "0.2",
        "sparse_infill_density": "15%",
        "nozzle_temperature": ["220"],
        "hot_plate_temp": ["60"],
        "filament_type": ["PLA", "PLA"],
        "filament_colour": ["#00AE42", "#00AE42"]
    }"##;

    const SLICE_INFO_XML: &str = r##"<config>
        <plate>
            <metadata key="index" value="1"/>
            <metadata key="prediction" value="6293"/>
            <metadata key="weight" value="21.94"/>
            <object identify_id="1" name="part.stl" skipped="false"/>
            <object identify_id="2" name="part.stl" skipped="false"/>
            <filament id="1" type="PLA" color="#00AE42" used_m="7.92" used_g="23.65"/>
        </plate>
    </config>"##;

    #[test]
    fn detects_by_application_marker() {
        let archive = archive_of(&[
            ("3D/3dmodel.model", MODEL_XML.as_bytes()),
            (PROJECT_SETTINGS, SETTINGS_JSON.as_bytes()),
        ]);
        assert!(BambuParser.can_parse(&archive));

        let foreign = archive_of(&[
            (
                "3D/3dmodel.model",
                br#"<metadata name="Application">OrcaSlicer-1.9.0</metadata>"#,
            ),
            (PROJECT_SETTINGS, SETTINGS_JSON.as_bytes()),
        ]);
        assert!(!BambuParser.can_parse(&foreign));

        let no_settings = archive_of(&[("3D/3dmodel.model", MODEL_XML.as_bytes())]);
        assert!(!BambuParser.can_parse(&no_settings));
    }

    #[test]
    fn full_container_extraction() {
        let archive = archive_of(&[
            ("3D/3dmodel.model", MODEL_XML.as_bytes()),
            (PROJECT_SETTINGS, SETTINGS_JSON.as_bytes()),
            (SLICE_INFO, SLICE_INFO_XML.as_bytes()),
            ("Metadata/plate_1.png", b"\x89PNG fake".as_slice()),
        ]);

        let profile = BambuParser.parse(&archive).unwrap();
        assert_eq!(profile.slicer, SlicerKind::Bambu);
        assert_eq!(profile.printer_name, "Bambu Lab X1 Carbon");
        assert_eq!(profile.normalized_printer_name, "x1 carbon");
        assert_eq!(profile.metadata.print_time_seconds, Some(6293));
        assert_eq!(profile.metadata.filament_weight_grams, Some(21.94));
        assert_eq!(profile.metadata.layer_height_mm, Some(0.2));
        assert_eq!(profile.metadata.infill_percent, Some(15.0));
        assert_eq!(profile.metadata.nozzle_temp_c, Some(220));
        assert_eq!(profile.metadata.bed_temp_c, Some(60));
        assert_eq!(profile.metadata.plate_copies, Some(2));
        // slice_info reported a single PLA spool; it wins over the
        // two-entry settings list.
        assert_eq!(
            profile.metadata.filament_summary.as_deref(),
            Some("PLA (#00AE42)")
        );
        assert_eq!(profile.thumbnail.as_deref(), Some(b"\x89PNG fake".as_slice()));
    }

    #[test]
    fn settings_only_container_still_parses() {
        let archive = archive_of(&[
            ("3D/3dmodel.model", MODEL_XML.as_bytes()),
            (PROJECT_SETTINGS, SETTINGS_JSON.as_bytes()),
        ]);

        let profile = BambuParser.parse(&archive).unwrap();
        assert_eq!(profile.metadata.print_time_seconds, None);
        assert_eq!(profile.metadata.plate_copies, None);
        assert!(profile.thumbnail.is_none());
        // Falls back to the settings filament list, grouped.
        assert_eq!(
            profile.metadata.filament_summary.as_deref(),
            Some("2x PLA (#00AE42)")
        );
    }

    #[test]
    fn printer_name_falls_back_to_settings_id() {
        let archive = archive_of(&[
            ("3D/3dmodel.model", MODEL_XML.as_bytes()),
            (
                PROJECT_SETTINGS,
                br#"{"printer_settings_id": "Bambu Lab P1S 0.4 nozzle"}"#.as_slice(),
            ),
        ]);
        let profile = BambuParser.parse(&archive).unwrap();
        assert_eq!(profile.printer_name, "Bambu Lab P1S 0.4 nozzle");
    }
}
