use super::bambu::{self, PROJECT_SETTINGS};
use super::{DialectError, DialectParser, application_marker};
use crate::container::Archive;
use crate::profile::{ParsedProfile, SlicerKind};

/// OrcaSlicer dialect. Orca is a Bambu Studio fork and writes the same
/// container layout; only the application marker differs.
pub struct OrcaParser;

impl DialectParser for OrcaParser {
    fn kind(&self) -> SlicerKind {
        SlicerKind::Orca
    }

    fn can_parse(&self, archive: &Archive) -> bool {
        if !archive.contains(PROJECT_SETTINGS) {
            return false;
        }
        application_marker(archive)
            .is_some_and(|app| app.to_lowercase().contains("orcaslicer"))
    }

    fn parse(&self, archive: &Archive) -> Result<ParsedProfile, DialectError> {
        bambu::parse_family(archive, SlicerKind::Orca)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn archive_of(entries: &[(&str, &str)]) -> Archive {
        Archive::from_entries(
            entries
                .iter()
                .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn detects_orca_marker() {
        let archive = archive_of(&[
            (
                "3D/3dmodel.model",
                r#"<metadata name="Application">OrcaSlicer-1.9.0</metadata>"#,
            ),
            (
                PROJECT_SETTINGS,
                r#"{"printer_model": "Voron 2.4", "layer_height": "0.25"}"#,
            ),
        ]);
        assert!(OrcaParser.can_parse(&archive));

        let profile = OrcaParser.parse(&archive).unwrap();
        assert_eq!(profile.slicer, SlicerKind::Orca);
        assert_eq!(profile.printer_name, "Voron 2.4");
        assert_eq!(profile.metadata.layer_height_mm, Some(0.25));
    }

    #[test]
    fn does_not_claim_bambu_containers() {
        let archive = archive_of(&[
            (
                "3D/3dmodel.model",
                r#"<metadata name="Application">BambuStudio-1.8</metadata>"#,
            ),
            (PROJECT_SETTINGS, r#"{"printer_model": "Bambu Lab X1 Carbon"}"#),
        ]);
        assert!(!OrcaParser.can_parse(&archive));
    }
}
