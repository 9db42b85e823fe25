use std::collections::BTreeMap;

use super::{DialectError, DialectParser};
use crate::container::Archive;
use crate::filament::{self, Filament};
use crate::profile::{ParsedProfile, ProfileMetadata, SlicerKind};
use crate::timefmt::parse_print_duration;

const PRUSA_CONFIG: &str = "Metadata/Slic3r_PE.config";
const THUMBNAIL_PREFIX: &str = "Metadata/thumbnail";

/// PrusaSlicer dialect. Settings are an INI-style dump of `; key = value`
/// lines; multi-extruder values are `;`-separated within one line.
pub struct PrusaParser;

impl DialectParser for PrusaParser {
    fn kind(&self) -> SlicerKind {
        SlicerKind::Prusa
    }

    fn can_parse(&self, archive: &Archive) -> bool {
        archive.contains(PRUSA_CONFIG)
    }

    fn parse(&self, archive: &Archive) -> Result<ParsedProfile, DialectError> {
        let raw = archive
            .entry_utf8(PRUSA_CONFIG)
            .ok_or_else(|| DialectError::MissingEntry(PRUSA_CONFIG.into()))?;
        let config = config_map(&raw);

        let printer_name = config
            .get("printer_settings_id")
            .or_else(|| config.get("printer_model"))
            .cloned();
        let mut profile = ParsedProfile::new(SlicerKind::Prusa, printer_name);

        let filaments = collect_filaments(&config);

        profile.metadata = ProfileMetadata {
            print_time_seconds: config
                .get("estimated printing time (normal mode)")
                .or_else(|| config.get("estimated printing time"))
                .and_then(|v| parse_print_duration(v)),
            filament_weight_grams: filament::total_weight_grams(&filaments),
            filament_summary: filament::summarize(&filaments),
            layer_height_mm: config.get("layer_height").and_then(|v| v.parse().ok()),
            infill_percent: config
                .get("fill_density")
                .and_then(|v| v.trim_end_matches('%').trim().parse().ok()),
            nozzle_temp_c: first_numeric(config.get("temperature")),
            bed_temp_c: first_numeric(config.get("bed_temperature")),
            plate_copies: None,
        };

        profile.thumbnail = archive
            .largest_matching(THUMBNAIL_PREFIX, ".png")
            .map(<[u8]>::to_vec);

        Ok(profile)
    }
}

/// Parse `; key = value` lines. Lines without `=` and blank lines are
/// skipped; the leading comment marker is optional.
fn config_map(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(';').trim();
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = value.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Zip the parallel `;`-separated filament columns into per-extruder
/// records. Weights use `, ` separators in `filament used [g]`.
fn collect_filaments(config: &BTreeMap<String, String>) -> Vec<Filament> {
    let types: Vec<String> = split_multi(config.get("filament_type"), ';');
    let colours: Vec<String> = split_multi(
        config
            .get("extruder_colour")
            .or_else(|| config.get("filament_colour")),
        ';',
    );
    let weights: Vec<Option<f64>> = split_multi(config.get("filament used [g]"), ',')
        .into_iter()
        .map(|w| w.parse().ok())
        .collect();

    types
        .into_iter()
        .enumerate()
        .map(|(i, material)| Filament {
            material,
            color: colours.get(i).cloned().filter(|c| !c.is_empty()),
            used_grams: weights.get(i).copied().flatten(),
        })
        .collect()
}

fn split_multi(value: Option<&String>, separator: char) -> Vec<String> {
    value
        .map(|v| {
            v.split(separator)
                .map(|part| part.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn first_numeric(value: Option<&String>) -> Option<i32> {
    value?
        .split(';')
        .next()?
        .trim()
        .parse::<f64>()
        .ok()
        .map(|v| v.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_of(entries: &[(&str, &[u8])]) -> Archive {
        Archive::from_entries(
            entries
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_vec()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    const CONFIG: &str = "\
; generated by PrusaSlicer 2.7.1\n\
; printer_model = MK4\n\
; printer_settings_id = Original Prusa MK4 0.4 nozzle\n\
; estimated printing time (normal mode) = 1h 30m 45s\n\
; filament_type = PLA;PETG\n\
; extruder_colour = #FF8000;#00AE42\n\
; filament used [g] = 21.9, 3.25\n\
; layer_height = 0.2\n\
; fill_density = 15%\n\
; temperature = 215;230\n\
; bed_temperature = 60;85\n";

    #[test]
    fn detects_by_config_presence() {
        let archive = archive_of(&[(PRUSA_CONFIG, CONFIG.as_bytes())]);
        assert!(PrusaParser.can_parse(&archive));

        let other = archive_of(&[("Metadata/project_settings.config", b"{}".as_slice())]);
        assert!(!PrusaParser.can_parse(&other));
    }

    #[test]
    fn full_config_extraction() {
        let archive = archive_of(&[
            (PRUSA_CONFIG, CONFIG.as_bytes()),
            ("Metadata/thumbnail_16x16.png", &[0u8; 16]),
            ("Metadata/thumbnail_640x480.png", &[1u8; 640]),
        ]);

        let profile = PrusaParser.parse(&archive).unwrap();
        assert_eq!(profile.slicer, SlicerKind::Prusa);
        assert_eq!(profile.printer_name, "Original Prusa MK4 0.4 nozzle");
        assert_eq!(profile.metadata.print_time_seconds, Some(5445));
        assert_eq!(
            profile.metadata.filament_summary.as_deref(),
            Some("PLA (#FF8000), PETG (#00AE42)")
        );
        assert_eq!(profile.metadata.filament_weight_grams, Some(25.15));
        assert_eq!(profile.metadata.layer_height_mm, Some(0.2));
        assert_eq!(profile.metadata.infill_percent, Some(15.0));
        assert_eq!(profile.metadata.nozzle_temp_c, Some(215));
        assert_eq!(profile.metadata.bed_temp_c, Some(60));
        // Largest thumbnail wins.
        assert_eq!(profile.thumbnail.as_deref(), Some(&[1u8; 640][..]));
    }

    #[test]
    fn sparse_config_defaults() {
        let archive = archive_of(&[(PRUSA_CONFIG, b"; layer_height = 0.3\n".as_slice())]);
        let profile = PrusaParser.parse(&archive).unwrap();
        assert_eq!(profile.printer_name, crate::profile::UNKNOWN_PRINTER);
        assert_eq!(profile.metadata.layer_height_mm, Some(0.3));
        assert_eq!(profile.metadata.filament_summary, None);
        assert!(profile.thumbnail.is_none());
    }

    #[test]
    fn config_lines_without_marker_also_parse() {
        let map = config_map("printer_model = MINI\nnot a pair\n");
        assert_eq!(map.get("printer_model").map(String::as_str), Some("MINI"));
        assert_eq!(map.len(), 1);
    }
}
