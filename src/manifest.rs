use serde::{Deserialize, Serialize};
use thiserror::Error;
use uom::si::f64::Length;
use uom::si::length::nautical_mile;

use crate::json::{self, DecodeError};
use crate::schema::{self, FieldShape, RecordShape, Schema, SchemaError, Shape};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{0}")]
    Schema(#[from] SchemaError),
    #[error("failed to deserialize manifest: {0}")]
    Deserialize(#[from] DecodeError),
}

/// One DAT file to convert and the metadata of the resulting map.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ManifestEntry {
    pub filename: String,
    #[serde(default)]
    pub group: i64,
    #[serde(default)]
    pub label: String,
    pub name: String,
    pub id: i64,
    /// Nautical miles, 0 selects the default radius.
    #[serde(default)]
    pub radius: f32,
}

static MANIFEST_ENTRY: RecordShape = RecordShape {
    name: "ManifestEntry",
    fields: &[
        FieldShape {
            tags: "filename",
            shape: <String as Schema>::shape,
        },
        FieldShape {
            tags: "group",
            shape: <i64 as Schema>::shape,
        },
        FieldShape {
            tags: "label",
            shape: <String as Schema>::shape,
        },
        FieldShape {
            tags: "name",
            shape: <String as Schema>::shape,
        },
        FieldShape {
            tags: "id",
            shape: <i64 as Schema>::shape,
        },
        FieldShape {
            tags: "radius",
            shape: <f32 as Schema>::shape,
        },
    ],
};

impl Schema for ManifestEntry {
    fn shape() -> Shape {
        Shape::Record(&MANIFEST_ENTRY)
    }
}

impl ManifestEntry {
    #[allow(clippy::float_cmp)]
    pub fn radius(&self, default: Length) -> Length {
        if self.radius == 0.0 {
            default
        } else {
            Length::new::<nautical_mile>(f64::from(self.radius))
        }
    }
}

pub type ManifestResult = Result<Vec<ManifestEntry>, ManifestError>;

/// Validates the manifest's structure, then decodes it.
pub fn parse_manifest(content: &[u8]) -> ManifestResult {
    schema::validate::<Vec<ManifestEntry>>(content)?;
    Ok(json::from_slice(content)?)
}

#[cfg(test)]
mod test {
    use pretty_assertions_sorted::assert_eq_sorted;
    use uom::si::f64::Length;
    use uom::si::length::nautical_mile;

    use crate::json::{DecodeError, TextPosition};
    use crate::schema::{SchemaError, Violation};

    use super::{parse_manifest, ManifestEntry, ManifestError};

    const MANIFEST: &str = r#"[
    {
        "filename": "bos/A90_BOS_NORTH.dat",
        "group": 0,
        "label": "BOS N",
        "name": "A90 BOS NORTH",
        "id": 101,
        "radius": 0
    },
    {
        "filename": "bos/A90_MHT.dat",
        "group": 1,
        "label": "MHT",
        "name": "A90 MHT",
        "id": 102,
        "radius": 40.5
    }
]
"#;

    #[test]
    fn test_manifest() {
        let parsed = parse_manifest(MANIFEST.as_bytes());
        assert!(parsed.is_ok(), "{}", parsed.unwrap_err());

        assert_eq_sorted!(
            parsed.unwrap(),
            vec![
                ManifestEntry {
                    filename: "bos/A90_BOS_NORTH.dat".to_string(),
                    group: 0,
                    label: "BOS N".to_string(),
                    name: "A90 BOS NORTH".to_string(),
                    id: 101,
                    radius: 0.0,
                },
                ManifestEntry {
                    filename: "bos/A90_MHT.dat".to_string(),
                    group: 1,
                    label: "MHT".to_string(),
                    name: "A90 MHT".to_string(),
                    id: 102,
                    radius: 40.5,
                },
            ]
        );
    }

    #[test]
    fn test_manifest_optional_fields() {
        let parsed =
            parse_manifest(br#"[{"filename": "a.dat", "name": "A", "id": 1}]"#).unwrap();
        assert_eq!(parsed[0].group, 0);
        assert_eq!(parsed[0].label, "");
        assert_eq!(parsed[0].radius, 0.0);
    }

    #[test]
    fn test_manifest_misspelled_field() {
        let misspelled = MANIFEST.replace("\"radius\": 40.5", "\"raduis\": 40.5");

        match parse_manifest(misspelled.as_bytes()) {
            Err(ManifestError::Schema(SchemaError::Violations(violations))) => {
                assert_eq_sorted!(
                    violations.0,
                    vec![Violation::UnrecognizedField {
                        path: "$[1].raduis".to_string(),
                        record: "ManifestEntry",
                        field: "raduis".to_string(),
                    }]
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_manifest_not_an_array() {
        let result = parse_manifest(br#"{"filename": "a.dat", "name": "A", "id": 1}"#);
        assert!(matches!(
            result,
            Err(ManifestError::Schema(SchemaError::Violations(_)))
        ));
    }

    #[test]
    fn test_manifest_type_error_position() {
        let wrong_type = MANIFEST.replace("\"radius\": 40.5", "\"radius\": \"far\"");

        match parse_manifest(wrong_type.as_bytes()) {
            Err(ManifestError::Deserialize(DecodeError::Type {
                position,
                value,
                field,
                detail,
            })) => {
                let offset = wrong_type.find("\"far\"").unwrap();
                let before = &wrong_type[..offset];
                let expected = TextPosition {
                    line: before.matches('\n').count() + 1,
                    character: offset - before.rfind('\n').map_or(0, |i| i + 1) + 1,
                };
                assert_eq!(position, expected);
                assert_eq!(position.line, 16);
                assert_eq!(value, "\"far\"");
                assert_eq!(field, "ManifestEntry.radius");
                assert!(detail.contains("expected f32"), "{detail}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_manifest_container_for_scalar() {
        for (id, kind) in [("[1]", "array"), ("{\"x\": 1}", "object")] {
            let text = format!(r#"[{{"filename": "a", "name": "A", "id": {id}}}]"#);

            match parse_manifest(text.as_bytes()) {
                Err(ManifestError::Deserialize(DecodeError::Type {
                    position,
                    value,
                    field,
                    ..
                })) => {
                    assert_eq!(
                        position,
                        TextPosition {
                            line: 1,
                            character: 39
                        }
                    );
                    assert_eq!(value, kind);
                    assert_eq!(field, "ManifestEntry.id");
                }
                other => panic!("unexpected result for {id}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_effective_radius() {
        let default = Length::new::<nautical_mile>(75.0);
        let mut entry = ManifestEntry {
            filename: "a.dat".to_string(),
            group: 0,
            label: String::new(),
            name: "A".to_string(),
            id: 1,
            radius: 0.0,
        };
        assert_eq!(entry.radius(default), default);

        entry.radius = 40.0;
        assert!((entry.radius(default).get::<nautical_mile>() - 40.0).abs() < 1e-9);
    }
}
