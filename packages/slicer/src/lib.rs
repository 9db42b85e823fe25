//! 3MF slicer dialect detection and print-profile extraction.
//!
//! A 3MF file is a ZIP container. [`Archive`] holds its decompressed
//! entries; [`parse_container`] runs the fixed-priority dialect list over
//! them and yields a normalized [`ParsedProfile`] or a tagged soft failure.

pub mod container;
pub mod dialect;
pub mod filament;
pub mod printer;
pub mod profile;
pub mod timefmt;

pub use container::{Archive, ContainerError};
pub use dialect::{DialectError, DialectParser, ParseOutcome, parse_archive, parse_container};
pub use profile::{ParsedProfile, ProfileMetadata, SlicerKind, UNKNOWN_PRINTER};
