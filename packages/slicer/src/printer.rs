/// Vendor phrases that carry no identity: two names differing only by one
/// of these refer to the same printer.
const VENDOR_NOISE: &[&str] = &[
    "bambu lab",
    "bambulab",
    "prusa research",
    "original prusa",
    "creality",
    "voron design",
];

/// Canonical form of a printer name used for conflict matching.
///
/// Case-folds, strips known vendor noise, and collapses every run of
/// punctuation or whitespace into a single space. Matching on the result
/// is exact equality, not fuzzy distance.
pub fn normalize_printer_name(name: &str) -> String {
    let mut lowered = name.to_lowercase();
    for noise in VENDOR_NOISE {
        lowered = lowered.replace(noise, " ");
    }
    lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two printer names conflict when their canonical forms are identical.
pub fn is_conflict(a: &str, b: &str) -> bool {
    normalize_printer_name(a) == normalize_printer_name(b)
}

/// Pick a display name that does not conflict with any name in `taken`
/// (given in normalized form), by appending ` (2)`, ` (3)`, ...
pub fn disambiguate(name: &str, taken: &[String]) -> String {
    for n in 2u32.. {
        let candidate = format!("{name} ({n})");
        let normalized = normalize_printer_name(&candidate);
        if !taken.contains(&normalized) {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_case_folds_and_collapses() {
        assert_eq!(normalize_printer_name("Bambu X1C "), "bambu x1c");
        assert_eq!(normalize_printer_name("X1-Carbon"), "x1 carbon");
        assert_eq!(normalize_printer_name("  MK4   (0.4mm)"), "mk4 0 4mm");
    }

    #[test]
    fn vendor_noise_is_stripped() {
        assert_eq!(normalize_printer_name("Bambu Lab X1 Carbon"), "x1 carbon");
        assert_eq!(
            normalize_printer_name("Original Prusa MK4"),
            normalize_printer_name("MK4")
        );
    }

    #[test]
    fn conflict_is_normalization_equality() {
        assert!(is_conflict("Bambu X1C ", "bambu x1c"));
        assert!(!is_conflict("Bambu X1C", "Bambu P1S"));
        assert!(is_conflict("Bambu Lab P1S", "P1S"));
    }

    #[test]
    fn disambiguation_avoids_taken_names() {
        let taken = vec![
            normalize_printer_name("X1 Carbon"),
            normalize_printer_name("X1 Carbon (2)"),
        ];
        let picked = disambiguate("X1 Carbon", &taken);
        assert_eq!(picked, "X1 Carbon (3)");
        assert!(!taken.contains(&normalize_printer_name(&picked)));
    }

    #[test]
    fn disambiguated_names_do_not_reconflict() {
        let original = "X1 Carbon";
        let taken = vec![normalize_printer_name(original)];
        let second = disambiguate(original, &taken);
        assert!(!is_conflict(original, &second));
    }
}
