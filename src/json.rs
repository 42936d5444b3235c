//! JSON decoding that reports failures with a line/character position.

use std::any::type_name;
use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde_json::error::Category;
use thiserror::Error;

use crate::schema::{Schema, Shape};

/// 1-based line and character of a byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextPosition {
    pub line: usize,
    pub character: usize,
}

impl TextPosition {
    pub fn at_offset(contents: &[u8], offset: usize) -> Self {
        contents.iter().take(offset).fold(
            TextPosition {
                line: 1,
                character: 1,
            },
            |position, &byte| {
                if byte == b'\n' {
                    TextPosition {
                        line: position.line + 1,
                        character: 1,
                    }
                } else {
                    TextPosition {
                        line: position.line,
                        character: position.character + 1,
                    }
                }
            },
        )
    }
}

impl Display for TextPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, character {}", self.line, self.character)
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("error at {position}: {detail}")]
    Syntax {
        position: TextPosition,
        detail: String,
    },
    #[error("error at {position}: {value} value for {field} invalid: {detail}")]
    Type {
        position: TextPosition,
        value: String,
        field: String,
        detail: String,
    },
    #[error("error at {position}: {detail}")]
    Data {
        position: TextPosition,
        detail: String,
    },
    #[error("failed to decode JSON: {0}")]
    Other(serde_json::Error),
}

pub fn from_slice<T: DeserializeOwned + Schema>(contents: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(contents)
        .map_err(|err| locate_error(contents, err, T::shape(), type_name::<T>()))
}

fn locate_error(
    contents: &[u8],
    err: serde_json::Error,
    shape: Shape,
    target: &str,
) -> DecodeError {
    let offset = offset_of(contents, err.line(), err.column());
    let detail = strip_position(&err);

    match err.classify() {
        Category::Syntax | Category::Eof => DecodeError::Syntax {
            position: TextPosition::at_offset(contents, offset),
            detail,
        },
        Category::Data if is_type_mismatch(&detail) => {
            let site = ValueSite::scan(contents, skip_separators(contents, offset));
            let field = site.key.as_deref().map_or_else(
                || target.to_string(),
                |key| match shape.record_declaring(key) {
                    Some(record) => format!("{}.{key}", record.name),
                    None => key.to_string(),
                },
            );
            DecodeError::Type {
                position: TextPosition::at_offset(contents, site.start),
                value: site.text(contents),
                field,
                detail,
            }
        }
        Category::Data => DecodeError::Data {
            position: TextPosition::at_offset(contents, offset),
            detail,
        },
        Category::Io => DecodeError::Other(err),
    }
}

fn is_type_mismatch(detail: &str) -> bool {
    ["invalid type", "invalid value", "invalid length"]
        .iter()
        .any(|prefix| detail.starts_with(prefix))
}

fn strip_position(err: &serde_json::Error) -> String {
    let message = err.to_string();
    let suffix = format!(" at line {} column {}", err.line(), err.column());
    message
        .strip_suffix(&suffix)
        .map_or_else(|| message.clone(), str::to_string)
}

/// Byte offset of serde_json's 1-based line and column.
fn offset_of(contents: &[u8], line: usize, column: usize) -> usize {
    let start_of_line = if line <= 1 {
        0
    } else {
        contents
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte == b'\n')
            .nth(line - 2)
            .map_or(contents.len(), |(i, _)| i + 1)
    };
    (start_of_line + column.saturating_sub(1)).min(contents.len())
}

/// First byte at or after `offset` that is not whitespace, `:` or `,`.
///
/// Mismatched arrays and objects are reported one byte before their opening
/// bracket, scalars on their last byte.
fn skip_separators(contents: &[u8], offset: usize) -> usize {
    contents
        .get(offset..)
        .unwrap_or_default()
        .iter()
        .position(|byte| !(byte.is_ascii_whitespace() || b":,".contains(byte)))
        .map_or(offset, |n| offset + n)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    Key,
    Value,
    Separator,
}

/// The last JSON value starting at or before a byte offset, with the object key it belongs to.
#[derive(Debug, Default, PartialEq)]
struct ValueSite {
    start: usize,
    end: usize,
    key: Option<String>,
}

fn string_end(contents: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < contents.len() {
        match contents[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    contents.len()
}

fn scalar_end(contents: &[u8], start: usize) -> usize {
    contents[start..]
        .iter()
        .position(|byte| byte.is_ascii_whitespace() || b",:]}".contains(byte))
        .map_or(contents.len(), |n| start + n)
}

impl ValueSite {
    fn scan(contents: &[u8], offset: usize) -> Self {
        let mut site = ValueSite::default();
        let mut expect = Expect::Value;
        let mut key: Option<String> = None;
        // open containers, with the key they are the value of
        let mut containers: Vec<(u8, Option<String>)> = vec![];

        let mut i = 0;
        while i < contents.len() && i <= offset {
            let byte = contents[i];
            match byte {
                b'{' | b'[' => {
                    if expect == Expect::Value {
                        site = ValueSite {
                            start: i,
                            end: i + 1,
                            key: key.clone(),
                        };
                    }
                    containers.push((byte, key.clone()));
                    expect = if byte == b'{' {
                        Expect::Key
                    } else {
                        Expect::Value
                    };
                    i += 1;
                }
                b'}' | b']' => {
                    key = containers.pop().and_then(|(_, key)| key);
                    expect = Expect::Separator;
                    i += 1;
                }
                b',' => {
                    match containers.last() {
                        Some((b'{', _)) => expect = Expect::Key,
                        Some((_, container_key)) => {
                            key.clone_from(container_key);
                            expect = Expect::Value;
                        }
                        None => expect = Expect::Separator,
                    }
                    i += 1;
                }
                b':' => {
                    expect = Expect::Value;
                    i += 1;
                }
                b'"' => {
                    let end = string_end(contents, i);
                    if expect == Expect::Key {
                        let text_end = (end - 1).max(i + 1);
                        key = Some(String::from_utf8_lossy(&contents[i + 1..text_end]).to_string());
                    } else {
                        site = ValueSite {
                            start: i,
                            end,
                            key: key.clone(),
                        };
                    }
                    expect = Expect::Separator;
                    i = end;
                }
                _ if byte.is_ascii_whitespace() => i += 1,
                _ => {
                    let end = scalar_end(contents, i).max(i + 1);
                    site = ValueSite {
                        start: i,
                        end,
                        key: key.clone(),
                    };
                    expect = Expect::Separator;
                    i = end;
                }
            }
        }

        site
    }

    fn text(&self, contents: &[u8]) -> String {
        match contents.get(self.start) {
            Some(b'[') => "array".to_string(),
            Some(b'{') => "object".to_string(),
            _ => String::from_utf8_lossy(contents.get(self.start..self.end).unwrap_or_default())
                .to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use serde::Deserialize;
    use serde_json::Value;

    use crate::schema::{FieldShape, RecordShape, Schema, Shape};

    use super::{from_slice, DecodeError, TextPosition, ValueSite};

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Runway {
        designator: String,
        #[serde(alias = "hdg")]
        heading: u16,
    }

    static RUNWAY: RecordShape = RecordShape {
        name: "Runway",
        fields: &[
            FieldShape {
                tags: "designator",
                shape: <String as Schema>::shape,
            },
            FieldShape {
                tags: "heading,hdg",
                shape: <u16 as Schema>::shape,
            },
        ],
    };

    impl Schema for Runway {
        fn shape() -> Shape {
            Shape::Record(&RUNWAY)
        }
    }

    fn manual_position(text: &str, needle: &str) -> TextPosition {
        let offset = text.find(needle).unwrap();
        let before = &text[..offset];
        TextPosition {
            line: before.matches('\n').count() + 1,
            character: offset - before.rfind('\n').map_or(0, |i| i + 1) + 1,
        }
    }

    #[test]
    fn test_position_at_offset() {
        let text = b"ab\ncd\n\nef";
        assert_eq!(
            TextPosition::at_offset(text, 0),
            TextPosition {
                line: 1,
                character: 1
            }
        );
        assert_eq!(
            TextPosition::at_offset(text, 4),
            TextPosition {
                line: 2,
                character: 2
            }
        );
        assert_eq!(
            TextPosition::at_offset(text, 7),
            TextPosition {
                line: 4,
                character: 1
            }
        );
        assert_eq!(
            TextPosition::at_offset(text, 100),
            TextPosition {
                line: 4,
                character: 3
            }
        );
    }

    #[test]
    fn test_value_site_scan() {
        let text = br#"{"a": [1, {"b": "x,y"}], "c": 22}"#;
        let offset = text.len() - 2;
        let site = ValueSite::scan(text, offset);
        assert_eq!(site.key.as_deref(), Some("c"));
        assert_eq!(site.text(text), "22");

        let offset = text.iter().position(|&b| b == b'y').unwrap();
        let site = ValueSite::scan(text, offset);
        assert_eq!(site.key.as_deref(), Some("b"));
        assert_eq!(site.text(text), r#""x,y""#);

        let site = ValueSite::scan(text, 7);
        assert_eq!(site.key.as_deref(), Some("a"));
        assert_eq!(site.text(text), "1");
    }

    #[test]
    fn test_type_error_position() {
        let text = "[\n  {\"designator\": \"04R\", \"heading\": 35},\n  {\"designator\": \"22L\",\n   \"heading\": \"two-fifteen\"}\n]\n";

        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Type {
                position,
                value,
                field,
                detail,
            }) => {
                assert_eq!(position, manual_position(text, "\"two-fifteen\""));
                assert_eq!(position.line, 4);
                assert_eq!(value, "\"two-fifteen\"");
                assert_eq!(field, "Runway.heading");
                assert!(detail.contains("expected u16"), "{detail}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_type_error_alias_field() {
        let text = "[{\"designator\": \"04R\", \"hdg\": -35}]";

        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Type {
                position,
                value,
                field,
                ..
            }) => {
                assert_eq!(position, manual_position(text, "-35"));
                assert_eq!(value, "-35");
                assert_eq!(field, "Runway.hdg");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_type_error_array_value() {
        let text = "[\n  {\"designator\": \"04R\",\n   \"heading\": [35, 215]}\n]";

        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Type {
                position,
                value,
                field,
                detail,
            }) => {
                assert_eq!(position, manual_position(text, "[35"));
                assert_eq!(value, "array");
                assert_eq!(field, "Runway.heading");
                assert!(detail.contains("sequence"), "{detail}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_type_error_object_value() {
        let text = "[{\"designator\": \"04R\", \"hdg\":{\"magnetic\": 35}}]";

        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Type {
                position,
                value,
                field,
                detail,
            }) => {
                assert_eq!(position, manual_position(text, "{\"magnetic"));
                assert_eq!(value, "object");
                assert_eq!(field, "Runway.hdg");
                assert!(detail.contains("map"), "{detail}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_type_error_array_after_separator() {
        let text = "[[1, 2], [3, [4]]]";

        match from_slice::<Vec<Vec<u8>>>(text.as_bytes()) {
            Err(DecodeError::Type { position, value, .. }) => {
                assert_eq!(position, manual_position(text, "[4]"));
                assert_eq!(value, "array");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_position() {
        let text = "[\n  {\"designator\": \"04R\",, \"heading\": 35}\n]";
        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Syntax { position, .. }) => assert_eq!(position.line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_field() {
        let text = "[{\"designator\": \"04R\"}]";
        match from_slice::<Vec<Runway>>(text.as_bytes()) {
            Err(DecodeError::Data { detail, .. }) => {
                assert_eq!(detail, "missing field `heading`");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_untyped_value() {
        let value = from_slice::<Value>(b"{\"anything\": [1, \"goes\"]}").unwrap();
        assert_eq!(value["anything"][1], "goes");
    }
}
