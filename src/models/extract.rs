//! Path traversal and scalar coercion over event documents
//!
//! An extraction path is a fixed sequence of object-key and array-index
//! steps. Resolving a path never panics: every mismatch is reported as an
//! [`ExtractionFailure`].

use serde_json::{Number, Value};
use std::fmt;

use super::error::ExtractionFailure;
use super::event::EventDocument;

/// Largest integer an `f64` can represent exactly (2^53)
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// A single step of an extraction path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Look up a key in an object
    Key(&'static str),
    /// Look up an index in an array
    Index(usize),
}

/// A fixed sequence of steps from the document root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(&'static [Step]);

impl FieldPath {
    /// Create a path from a static list of steps
    pub const fn new(steps: &'static [Step]) -> Self {
        FieldPath(steps)
    }

    /// Resolve this path against a document
    pub fn resolve<'a>(&self, document: &'a EventDocument) -> Result<&'a Value, ExtractionFailure> {
        let mut steps = self.0.iter();

        let mut current = match steps.next() {
            Some(Step::Key(key)) => document
                .get(*key)
                .ok_or_else(|| ExtractionFailure::MissingKey((*key).to_string()))?,
            Some(Step::Index(_)) => {
                return Err(ExtractionFailure::TypeMismatch {
                    expected: "array",
                    found: "object",
                })
            },
            None => return Err(ExtractionFailure::Empty),
        };

        for step in steps {
            current = match (step, current) {
                (Step::Key(key), Value::Object(map)) => map
                    .get(*key)
                    .ok_or_else(|| ExtractionFailure::MissingKey((*key).to_string()))?,
                (Step::Index(index), Value::Array(items)) => {
                    items.get(*index).ok_or(ExtractionFailure::IndexOutOfRange {
                        index: *index,
                        len: items.len(),
                    })?
                },
                (Step::Key(_), other) => {
                    return Err(ExtractionFailure::TypeMismatch {
                        expected: "object",
                        found: json_type(other),
                    })
                },
                (Step::Index(_), other) => {
                    return Err(ExtractionFailure::TypeMismatch {
                        expected: "array",
                        found: json_type(other),
                    })
                },
            };
        }

        Ok(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, step) in self.0.iter().enumerate() {
            match step {
                Step::Key(key) if position == 0 => write!(f, "{}", key)?,
                Step::Key(key) => write!(f, ".{}", key)?,
                Step::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Expected scalar type at the end of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string, taken as-is
    Text,
    /// JSON number with an integral value, rendered in decimal
    Integer,
    /// Either of the above
    Identifier,
}

impl FieldKind {
    /// Human-readable name of the accepted JSON type
    pub fn expected(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
            FieldKind::Identifier => "string or integer",
        }
    }

    /// Coerce a resolved value into its string form
    pub fn coerce(&self, value: &Value) -> Result<String, ExtractionFailure> {
        match (self, value) {
            (FieldKind::Text | FieldKind::Identifier, Value::String(text)) => Ok(text.clone()),
            (FieldKind::Integer | FieldKind::Identifier, Value::Number(number)) => {
                integer_string(number)
            },
            (_, other) => Err(ExtractionFailure::TypeMismatch {
                expected: self.expected(),
                found: json_type(other),
            }),
        }
    }
}

/// A typed field: where to find it and how to read it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub path: FieldPath,
    pub kind: FieldKind,
}

impl Field {
    /// Resolve and coerce this field
    pub fn extract(&self, document: &EventDocument) -> Result<String, ExtractionFailure> {
        self.kind.coerce(self.path.resolve(document)?)
    }

    /// Like [`Field::extract`], but a JSON null reads as the empty string
    pub fn extract_nullable(&self, document: &EventDocument) -> Result<String, ExtractionFailure> {
        match self.path.resolve(document)? {
            Value::Null => Ok(String::new()),
            value => self.kind.coerce(value),
        }
    }
}

/// Render a JSON number as a plain decimal integer
///
/// Integral floats (`42.0`) are accepted when they are exactly
/// representable; `-0.0` renders as `0`. Whole floats beyond 2^53 are
/// [`ExtractionFailure::OutOfRange`].
pub fn integer_string(number: &Number) -> Result<String, ExtractionFailure> {
    if let Some(value) = number.as_i64() {
        return Ok(value.to_string());
    }
    if let Some(value) = number.as_u64() {
        return Ok(value.to_string());
    }
    match number.as_f64() {
        Some(value) if value.is_finite() && value.fract() == 0.0 => {
            if value.abs() <= MAX_EXACT_FLOAT_INT {
                Ok((value as i64).to_string())
            } else {
                Err(ExtractionFailure::OutOfRange(number.to_string()))
            }
        },
        _ => Err(ExtractionFailure::NonIntegral(number.to_string())),
    }
}

/// Name of a value's JSON type
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> EventDocument {
        match value {
            Value::Object(map) => map,
            other => panic!("test document must be an object, got {}", other),
        }
    }

    fn number(value: Value) -> Number {
        match value {
            Value::Number(number) => number,
            other => panic!("expected a number, got {}", other),
        }
    }

    const NESTED: FieldPath = FieldPath::new(&[Step::Key("head_commit"), Step::Key("id")]);
    const INDEXED: FieldPath =
        FieldPath::new(&[Step::Key("commits"), Step::Index(1), Step::Key("id")]);

    #[test]
    fn test_resolve_nested_key() {
        let doc = document(json!({"head_commit": {"id": "c1"}}));
        assert_eq!(NESTED.resolve(&doc).unwrap(), &json!("c1"));
    }

    #[test]
    fn test_resolve_array_index() {
        let doc = document(json!({"commits": [{"id": "a"}, {"id": "b"}]}));
        assert_eq!(INDEXED.resolve(&doc).unwrap(), &json!("b"));
    }

    #[test]
    fn test_resolve_failures() {
        let missing = document(json!({"other": 1}));
        assert_eq!(
            NESTED.resolve(&missing),
            Err(ExtractionFailure::MissingKey("head_commit".to_string()))
        );

        let scalar = document(json!({"head_commit": "c1"}));
        assert_eq!(
            NESTED.resolve(&scalar),
            Err(ExtractionFailure::TypeMismatch {
                expected: "object",
                found: "string"
            })
        );

        let short = document(json!({"commits": [{"id": "a"}]}));
        assert_eq!(
            INDEXED.resolve(&short),
            Err(ExtractionFailure::IndexOutOfRange { index: 1, len: 1 })
        );

        let not_array = document(json!({"commits": {"id": "a"}}));
        assert_eq!(
            INDEXED.resolve(&not_array),
            Err(ExtractionFailure::TypeMismatch {
                expected: "array",
                found: "object"
            })
        );
    }

    #[test]
    fn test_path_display() {
        assert_eq!(NESTED.to_string(), "head_commit.id");
        assert_eq!(INDEXED.to_string(), "commits[1].id");
    }

    #[test]
    fn test_integer_string() {
        let cases = vec![
            (json!(42), "42"),
            (json!(-7), "-7"),
            (json!(0), "0"),
            (json!(18446744073709551615u64), "18446744073709551615"),
            (json!(42.0), "42"),
            (json!(-0.0), "0"),
        ];
        for (value, expected) in cases {
            assert_eq!(integer_string(&number(value)).unwrap(), expected);
        }

        assert_eq!(
            integer_string(&number(json!(4.5))),
            Err(ExtractionFailure::NonIntegral("4.5".to_string()))
        );
    }

    #[test]
    fn test_large_float_is_out_of_range_not_fractional() {
        let value: Value = serde_json::from_str("1e16").unwrap();
        let failure = integer_string(&number(value)).unwrap_err();

        assert!(matches!(failure, ExtractionFailure::OutOfRange(_)));
        assert!(failure.to_string().contains("outside the exactly representable"));

        let edge: Value = serde_json::from_str("9007199254740992.0").unwrap();
        assert_eq!(integer_string(&number(edge)).unwrap(), "9007199254740992");
    }

    #[test]
    fn test_field_kind_coercion() {
        assert_eq!(FieldKind::Text.coerce(&json!("x")).unwrap(), "x");
        assert!(FieldKind::Text.coerce(&json!(1)).is_err());
        assert_eq!(FieldKind::Integer.coerce(&json!(12)).unwrap(), "12");
        assert!(FieldKind::Integer.coerce(&json!("12")).is_err());
        assert_eq!(FieldKind::Identifier.coerce(&json!("abc")).unwrap(), "abc");
        assert_eq!(FieldKind::Identifier.coerce(&json!(99)).unwrap(), "99");
        assert_eq!(
            FieldKind::Identifier.coerce(&json!(true)),
            Err(ExtractionFailure::TypeMismatch {
                expected: "string or integer",
                found: "boolean"
            })
        );
    }

    #[test]
    fn test_extract_nullable() {
        let field = Field {
            path: FieldPath::new(&[Step::Key("completed_at")]),
            kind: FieldKind::Text,
        };
        let doc = document(json!({"completed_at": null}));
        assert_eq!(field.extract_nullable(&doc).unwrap(), "");
        assert!(field.extract(&doc).is_err());
    }
}
