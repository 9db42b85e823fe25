use rand::Rng;
use rand::distr::Alphanumeric;

/// Why an uploaded filename was rejected.
#[derive(Debug)]
pub enum FilenameError {
    Empty,
    ContainsPathSeparator,
    /// The name is exactly `..`.
    PathTraversal,
    NullByte,
    /// Starts with a dot (hidden file).
    Hidden,
    /// Contains CR, LF, or other control characters.
    ControlCharacter,
    MissingExtension,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::MissingExtension => "Invalid filename: an extension is required",
        }
    }
}

/// Validates an uploaded filename. Names must be flat: no directory
/// components and nothing that could smuggle bytes into a
/// Content-Disposition header later.
pub fn validate_upload_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Splits a filename into stem and lowercased extension.
pub fn split_extension(filename: &str) -> Result<(&str, String), FilenameError> {
    let (stem, ext) = filename
        .rsplit_once('.')
        .ok_or(FilenameError::MissingExtension)?;
    if stem.is_empty() || ext.is_empty() {
        return Err(FilenameError::MissingExtension);
    }
    Ok((stem, ext.to_ascii_lowercase()))
}

/// URL-safe slug: lowercase alphanumerics with single dashes, capped at 48
/// characters, `file` when nothing survives.
pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= 48 {
            break;
        }
    }

    if slug.is_empty() {
        "file".to_string()
    } else {
        slug
    }
}

/// Six lowercase alphanumeric characters for stored-name uniqueness.
pub fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A validated upload filename turned into its stored form.
#[derive(Debug, Clone)]
pub struct StoredName {
    /// `{slug}-{suffix}.{ext}`
    pub stored: String,
    pub extension: String,
}

/// Produce the stored filename for an upload: the slugged stem plus a
/// random suffix, preserving the (lowercased) extension.
pub fn stored_filename(original: &str) -> Result<StoredName, FilenameError> {
    let original = validate_upload_filename(original)?;
    let (stem, extension) = split_extension(original)?;
    let stored = format!("{}-{}.{extension}", slugify(stem), random_suffix());
    Ok(StoredName { stored, extension })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_ordinary_names() {
        assert!(validate_upload_filename("part.stl").is_ok());
        assert!(validate_upload_filename("Benchy v2.3mf").is_ok());
        assert!(validate_upload_filename("  padded.obj  ").is_ok());
    }

    #[test]
    fn validate_rejects_bad_names() {
        assert!(matches!(
            validate_upload_filename(""),
            Err(FilenameError::Empty)
        ));
        assert!(matches!(
            validate_upload_filename("a/b.stl"),
            Err(FilenameError::ContainsPathSeparator)
        ));
        assert!(matches!(
            validate_upload_filename(".."),
            Err(FilenameError::PathTraversal)
        ));
        assert!(matches!(
            validate_upload_filename(".hidden"),
            Err(FilenameError::Hidden)
        ));
        assert!(matches!(
            validate_upload_filename("a\0b.stl"),
            Err(FilenameError::NullByte)
        ));
        assert!(matches!(
            validate_upload_filename("a\r\nb.stl"),
            Err(FilenameError::ControlCharacter)
        ));
    }

    #[test]
    fn split_extension_lowercases() {
        let (stem, ext) = split_extension("Benchy.STL").unwrap();
        assert_eq!(stem, "Benchy");
        assert_eq!(ext, "stl");

        assert!(matches!(
            split_extension("noext"),
            Err(FilenameError::MissingExtension)
        ));
    }

    #[test]
    fn slugify_collapses_and_caps() {
        assert_eq!(slugify("Benchy v2 (final)"), "benchy-v2-final");
        assert_eq!(slugify("__weird--name__"), "weird-name");
        assert_eq!(slugify("!!!"), "file");
        assert!(slugify(&"x".repeat(100)).len() <= 48);
    }

    #[test]
    fn stored_filename_shape() {
        let name = stored_filename("Benchy v2.STL").unwrap();
        assert_eq!(name.extension, "stl");
        assert!(name.stored.starts_with("benchy-v2-"));
        assert!(name.stored.ends_with(".stl"));
        // slug + dash + 6 char suffix + .ext
        assert_eq!(name.stored.len(), "benchy-v2".len() + 1 + 6 + 4);
    }

    #[test]
    fn stored_filenames_are_unique() {
        let a = stored_filename("part.stl").unwrap();
        let b = stored_filename("part.stl").unwrap();
        assert_ne!(a.stored, b.stored);
    }
}
