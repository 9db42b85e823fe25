pub mod filename;
pub mod version_label;
