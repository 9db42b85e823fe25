//! Dialect detection and dispatch.
//!
//! Each slicer writes its own config layout inside the 3MF container. A
//! dialect implements [`DialectParser`]; dispatch walks a fixed priority
//! list and the first `can_parse` match wins. Adding a slicer means adding
//! a parser and appending it to [`PARSERS`]; nothing else changes.

mod bambu;
mod orca;
mod prusa;

use thiserror::Error;

pub use bambu::BambuParser;
pub use orca::OrcaParser;
pub use prusa::PrusaParser;

use crate::container::Archive;
use crate::profile::{ParsedProfile, SlicerKind};

#[derive(Debug, Error)]
pub enum DialectError {
    #[error("missing container entry: {0}")]
    MissingEntry(String),
    #[error("malformed slicer config: {0}")]
    Config(String),
}

/// One slicer dialect's detection and extraction logic.
pub trait DialectParser: Send + Sync {
    fn kind(&self) -> SlicerKind;
    /// Cheap fingerprint check; must not allocate heavily or fail.
    fn can_parse(&self, archive: &Archive) -> bool;
    fn parse(&self, archive: &Archive) -> Result<ParsedProfile, DialectError>;
}

/// Fixed dialect priority. Order matters: a container carrying markers for
/// several dialects resolves to the first match, deterministically.
static PARSERS: [&(dyn DialectParser); 3] = [&BambuParser, &OrcaParser, &PrusaParser];

/// Soft, per-file result of profile extraction. Neither failure tag is an
/// error in the pipeline sense; callers surface them as user-visible
/// outcomes.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(ParsedProfile),
    /// No dialect recognized the container.
    UnknownFormat,
    /// A dialect claimed the container but extraction failed; the message
    /// is preserved for user display.
    ParseError(String),
}

impl ParseOutcome {
    pub fn into_profile(self) -> Option<ParsedProfile> {
        match self {
            Self::Parsed(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Run dialect dispatch over an already-opened archive.
pub fn parse_archive(archive: &Archive) -> ParseOutcome {
    for parser in PARSERS {
        if parser.can_parse(archive) {
            return match parser.parse(archive) {
                Ok(profile) => ParseOutcome::Parsed(profile),
                Err(err) => ParseOutcome::ParseError(err.to_string()),
            };
        }
    }
    ParseOutcome::UnknownFormat
}

/// Open a 3MF container and run dialect dispatch over it.
///
/// A byte buffer that is not a ZIP archive at all yields `ParseError`; the
/// caller has already decided (by extension) that this was meant to be 3MF.
pub fn parse_container(data: &[u8]) -> ParseOutcome {
    match Archive::from_zip_bytes(data) {
        Ok(archive) => parse_archive(&archive),
        Err(err) => ParseOutcome::ParseError(err.to_string()),
    }
}

/// Core-model entry every conforming 3MF carries.
const CORE_MODEL: &str = "3D/3dmodel.model";

/// Extract the `Application` metadata value from the 3MF core model, e.g.
/// `BambuStudio-01.08.00.57` or `OrcaSlicer-1.9.0`.
pub(crate) fn application_marker(archive: &Archive) -> Option<String> {
    let model = archive.entry_utf8(CORE_MODEL)?;
    let at = model.find("name=\"Application\"")?;
    let rest = &model[at..];
    let open = rest.find('>')? + 1;
    let len = rest[open..].find('<')?;
    let value = rest[open..open + len].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// First `value="..."` following `key="{key}"` in an XML-ish config body.
/// The Bambu-family `slice_info.config` is flat enough that attribute
/// scanning beats pulling in an XML parser for four fields.
pub(crate) fn metadata_value(text: &str, key: &str) -> Option<String> {
    let needle = format!("key=\"{key}\"");
    let at = text.find(&needle)?;
    let rest = &text[at + needle.len()..];
    let open = rest.find("value=\"")? + "value=\"".len();
    let len = rest[open..].find('"')?;
    Some(rest[open..open + len].to_string())
}

/// Attribute value within a single element fragment.
pub(crate) fn element_attr(fragment: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=\"");
    let at = fragment.find(&needle)?;
    let open = at + needle.len();
    let len = fragment[open..].find('"')?;
    Some(fragment[open..open + len].to_string())
}

/// All `<{tag} .../>` element fragments in document order.
pub(crate) fn element_fragments<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag} ");
    let mut fragments = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find(&open) {
        let from = &rest[at..];
        let end = from.find('>').map(|i| i + 1).unwrap_or(from.len());
        fragments.push(&from[..end]);
        rest = &from[end..];
    }
    fragments
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
    fn application_marker_extraction() {
        let archive = archive_of(&[(
            "3D/3dmodel.model",
            r#"<model><metadata name="Application">BambuStudio-01.08.00.57</metadata></model>"#,
        )]);
        assert_eq!(
            application_marker(&archive).as_deref(),
            Some("BambuStudio-01.08.00.57")
        );

        let empty = archive_of(&[("3D/3dmodel.model", "<model/>")]);
        assert_eq!(application_marker(&empty), None);
    }

    #[test]
    fn metadata_value_scans_flat_config() {
        let text = r#"<plate>
            <metadata key="index" value="1"/>
            <metadata key="prediction" value="6293"/>
            <metadata key="weight" value="21.94"/>
        </plate>"#;
        assert_eq!(metadata_value(text, "prediction").as_deref(), Some("6293"));
        assert_eq!(metadata_value(text, "weight").as_deref(), Some("21.94"));
        assert_eq!(metadata_value(text, "missing"), None);
    }

    #[test]
    fn element_fragments_and_attrs() {
        let text = r##"<plate>
            <object identify_id="1" name="a.stl" skipped="false"/>
            <object identify_id="2" name="b.stl" skipped="false"/>
            <filament id="1" type="PLA" color="#00AE42" used_g="23.65"/>
        </plate>"##;
        assert_eq!(element_fragments(text, "object").len(), 2);
        let filaments = element_fragments(text, "filament");
        assert_eq!(filaments.len(), 1);
        assert_eq!(element_attr(filaments[0], "type").as_deref(), Some("PLA"));
        assert_eq!(
            element_attr(filaments[0], "used_g").as_deref(),
            Some("23.65")
        );
    }

    #[test]
    fn unknown_container_yields_unknown_format() {
        let archive = archive_of(&[("3D/3dmodel.model", "<model/>")]);
        assert!(matches!(
            parse_archive(&archive),
            ParseOutcome::UnknownFormat
        ));
    }

    #[test]
    fn non_zip_bytes_yield_parse_error() {
        assert!(matches!(
            parse_container(b"not a zip"),
            ParseOutcome::ParseError(_)
        ));
    }

    #[test]
    fn dispatch_priority_is_deterministic() {
        // Container carrying both a Bambu application marker and a Prusa
        // config file: the Bambu parser sits earlier in the priority list
        // and must win every time.
        let archive = archive_of(&[
            (
                "3D/3dmodel.model",
                r#"<metadata name="Application">BambuStudio-1.8</metadata>"#,
            ),
            (
                "Metadata/project_settings.config",
                r#"{"printer_model": "Bambu Lab X1 Carbon"}"#,
            ),
            (
                "Metadata/Slic3r_PE.config",
                "; printer_model = MK4\n",
            ),
        ]);

        for _ in 0..3 {
            match parse_archive(&archive) {
                ParseOutcome::Parsed(profile) => assert_eq!(profile.slicer, SlicerKind::Bambu),
                other => panic!("expected bambu parse, got {other:?}"),
            }
        }
    }

    #[test]
    fn claimed_but_malformed_yields_parse_error() {
        let archive = archive_of(&[
            (
                "3D/3dmodel.model",
                r#"<metadata name="Application">BambuStudio-1.8</metadata>"#,
            ),
            ("Metadata/project_settings.config", "{ not json"),
        ]);
        match parse_archive(&archive) {
            ParseOutcome::ParseError(msg) => assert!(msg.contains("project_settings")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
