use uuid::Uuid;

/// Namespace segment describing an object's role within a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// An uploaded model file (STL, OBJ, PLY).
    Source,
    /// A 3MF project file carrying slicer settings.
    Slicer,
    /// A derived object such as a preview thumbnail.
    Artifact,
    /// Short-lived intermediate object, not scoped to an org or model.
    /// Carries the caller's clock reading so key construction stays pure.
    Temp { epoch_millis: i64 },
}

impl ObjectKind {
    fn segment(self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Slicer => "slicer",
            Self::Artifact => "artifacts",
            Self::Temp { .. } => "temp",
        }
    }
}

/// Compute the storage key for an object.
///
/// Pure function: the same inputs always yield the same key, which is what
/// lets the ingestion pipeline know exactly what to delete on rollback even
/// when the corresponding database row was never written. Uniqueness
/// randomness is the caller's job, injected through `filename`.
///
/// Layout: `{org}/{model}/{version}/{sources|slicer|artifacts}/{filename}`,
/// or `temp/{epoch_millis}-{filename}` for [`ObjectKind::Temp`].
pub fn object_key(
    organization_id: Uuid,
    model_id: Uuid,
    version: &str,
    kind: ObjectKind,
    filename: &str,
) -> String {
    match kind {
        ObjectKind::Temp { epoch_millis } => format!("temp/{epoch_millis}-{filename}"),
        scoped => format!(
            "{organization_id}/{model_id}/{version}/{}/{filename}",
            scoped.segment()
        ),
    }
}

/// The key prefix under which every object of a version lives.
pub fn version_prefix(organization_id: Uuid, model_id: Uuid, version: &str) -> String {
    format!("{organization_id}/{model_id}/{version}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (
            Uuid::parse_str("0192f0c1-0000-7000-8000-000000000001").unwrap(),
            Uuid::parse_str("0192f0c1-0000-7000-8000-000000000002").unwrap(),
        )
    }

    #[test]
    fn scoped_kinds_use_org_model_version_layout() {
        let (org, model) = ids();
        let key = object_key(org, model, "v3", ObjectKind::Source, "part-x7k2q9.stl");
        assert_eq!(key, format!("{org}/{model}/v3/sources/part-x7k2q9.stl"));

        let key = object_key(org, model, "v3", ObjectKind::Slicer, "proj-a1b2c3.3mf");
        assert_eq!(key, format!("{org}/{model}/v3/slicer/proj-a1b2c3.3mf"));

        let key = object_key(org, model, "v3", ObjectKind::Artifact, "thumb.png");
        assert_eq!(key, format!("{org}/{model}/v3/artifacts/thumb.png"));
    }

    #[test]
    fn temp_kind_ignores_org_and_model() {
        let (org, model) = ids();
        let key = object_key(
            org,
            model,
            "v3",
            ObjectKind::Temp {
                epoch_millis: 1_700_000_000_123,
            },
            "pending.3mf",
        );
        assert_eq!(key, "temp/1700000000123-pending.3mf");
    }

    #[test]
    fn key_construction_is_deterministic() {
        let (org, model) = ids();
        let a = object_key(org, model, "v9", ObjectKind::Slicer, "same.3mf");
        let b = object_key(org, model, "v9", ObjectKind::Slicer, "same.3mf");
        assert_eq!(a, b);
    }

    #[test]
    fn version_prefix_covers_all_scoped_keys() {
        let (org, model) = ids();
        let prefix = version_prefix(org, model, "v2");
        for kind in [ObjectKind::Source, ObjectKind::Slicer, ObjectKind::Artifact] {
            let key = object_key(org, model, "v2", kind, "f.bin");
            assert!(key.starts_with(&prefix));
        }
    }
}
