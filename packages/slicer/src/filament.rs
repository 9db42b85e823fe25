/// One extruder's filament as reported by a slicer config.
#[derive(Debug, Clone, PartialEq)]
pub struct Filament {
    pub material: String,
    pub color: Option<String>,
    pub used_grams: Option<f64>,
}

/// Collapse a multi-extruder filament list into one display string.
///
/// Identical material+color pairs group together and gain a `Nx ` count
/// prefix when more than one extruder shares them:
/// `[PLA #00AE42, PLA #00AE42, PETG] -> "2x PLA (#00AE42), PETG"`.
pub fn summarize(filaments: &[Filament]) -> Option<String> {
    if filaments.is_empty() {
        return None;
    }

    // Group by material+color, preserving first-appearance order.
    let mut groups: Vec<(String, u32)> = Vec::new();
    for filament in filaments {
        let label = match filament.color.as_deref().filter(|c| !c.is_empty()) {
            Some(color) => format!("{} ({color})", filament.material),
            None => filament.material.clone(),
        };
        match groups.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, count)) => *count += 1,
            None => groups.push((label, 1)),
        }
    }

    let parts: Vec<String> = groups
        .into_iter()
        .map(|(label, count)| {
            if count > 1 {
                format!("{count}x {label}")
            } else {
                label
            }
        })
        .collect();
    Some(parts.join(", "))
}

/// Total filament weight across extruders, when any extruder reports one.
pub fn total_weight_grams(filaments: &[Filament]) -> Option<f64> {
    let mut total = 0.0;
    let mut any = false;
    for filament in filaments {
        if let Some(grams) = filament.used_grams {
            total += grams;
            any = true;
        }
    }
    any.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filament(material: &str, color: Option<&str>, grams: Option<f64>) -> Filament {
        Filament {
            material: material.to_string(),
            color: color.map(String::from),
            used_grams: grams,
        }
    }

    #[test]
    fn empty_list_has_no_summary() {
        assert_eq!(summarize(&[]), None);
    }

    #[test]
    fn single_filament() {
        let list = [filament("PLA", Some("#00AE42"), None)];
        assert_eq!(summarize(&list).unwrap(), "PLA (#00AE42)");
    }

    #[test]
    fn identical_pairs_group_with_count_prefix() {
        let list = [
            filament("PLA", Some("#00AE42"), None),
            filament("PLA", Some("#00AE42"), None),
            filament("PETG", None, None),
        ];
        assert_eq!(summarize(&list).unwrap(), "2x PLA (#00AE42), PETG");
    }

    #[test]
    fn same_material_different_color_stays_split() {
        let list = [
            filament("PLA", Some("#000000"), None),
            filament("PLA", Some("#FFFFFF"), None),
        ];
        assert_eq!(summarize(&list).unwrap(), "PLA (#000000), PLA (#FFFFFF)");
    }

    #[test]
    fn weights_sum_across_extruders() {
        let list = [
            filament("PLA", None, Some(21.5)),
            filament("PETG", None, Some(3.25)),
            filament("TPU", None, None),
        ];
        assert_eq!(total_weight_grams(&list), Some(24.75));
        assert_eq!(total_weight_grams(&[filament("PLA", None, None)]), None);
    }
}
