use serde::Serialize;

use crate::printer::normalize_printer_name;

/// Fallback printer name when a dialect finds nothing usable.
pub const UNKNOWN_PRINTER: &str = "Unknown Printer";

/// The slicer application that produced a 3MF container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlicerKind {
    Bambu,
    Orca,
    Prusa,
}

impl SlicerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bambu => "bambu",
            Self::Orca => "orca",
            Self::Prusa => "prusa",
        }
    }
}

impl std::fmt::Display for SlicerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized numeric print settings, independent of slicer dialect.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileMetadata {
    pub print_time_seconds: Option<u64>,
    pub filament_summary: Option<String>,
    pub filament_weight_grams: Option<f64>,
    pub layer_height_mm: Option<f64>,
    pub infill_percent: Option<f64>,
    pub nozzle_temp_c: Option<i32>,
    pub bed_temp_c: Option<i32>,
    /// Object copies on the first plate, for slicers that arrange plates.
    pub plate_copies: Option<u32>,
}

/// The result of extracting a print profile from a 3MF container.
#[derive(Debug, Clone)]
pub struct ParsedProfile {
    pub printer_name: String,
    pub normalized_printer_name: String,
    /// Raw embedded preview image bytes, if the container carries one.
    pub thumbnail: Option<Vec<u8>>,
    pub slicer: SlicerKind,
    pub metadata: ProfileMetadata,
}

impl ParsedProfile {
    /// Build a profile, falling back to [`UNKNOWN_PRINTER`] when the
    /// dialect could not determine a printer name.
    pub fn new(slicer: SlicerKind, printer_name: Option<String>) -> Self {
        let printer_name = printer_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_PRINTER.to_string());
        let normalized_printer_name = normalize_printer_name(&printer_name);
        Self {
            printer_name,
            normalized_printer_name,
            thumbnail: None,
            slicer,
            metadata: ProfileMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_printer_name_falls_back() {
        let profile = ParsedProfile::new(SlicerKind::Bambu, None);
        assert_eq!(profile.printer_name, UNKNOWN_PRINTER);

        let blank = ParsedProfile::new(SlicerKind::Prusa, Some("   ".into()));
        assert_eq!(blank.printer_name, UNKNOWN_PRINTER);
    }

    #[test]
    fn normalized_name_computed_on_construction() {
        let profile = ParsedProfile::new(SlicerKind::Bambu, Some("Bambu Lab X1 Carbon".into()));
        assert_eq!(profile.printer_name, "Bambu Lab X1 Carbon");
        assert_eq!(profile.normalized_printer_name, "x1 carbon");
    }
}
