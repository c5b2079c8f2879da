//! Form document model: a JSON tree of fields extracted from a document,
//! flattened into addressable leaves. A field interaction produces the
//! [`FieldRef`] the viewer resolves: the field's value when it is filled,
//! its name otherwise, or an explicit page location when the value carries
//! one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use viewer_core::{FieldRef, Rect};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("empty field path")]
    EmptyPath,
    #[error("path segment {0:?} does not address an object or array")]
    NotAContainer(String),
    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// One step into the JSON tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Dotted path to a leaf field: `insured.vehicles[0].vin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    pub fn element(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Last object key on the path, which is what the field is called.
    /// Skips trailing array indices, so `vehicles[0]` is named `vehicles`.
    pub fn field_name(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    /// Parse the display form back into a path.
    pub fn parse(raw: &str) -> Result<Self, FormError> {
        if raw.is_empty() {
            return Err(FormError::EmptyPath);
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let mut rest = part;
            if let Some(bracket) = rest.find('[') {
                if bracket > 0 {
                    segments.push(PathSegment::Key(rest[..bracket].to_owned()));
                }
                rest = &rest[bracket..];
                while let Some(stripped) = rest.strip_prefix('[') {
                    let Some(close) = stripped.find(']') else {
                        return Err(FormError::NotAContainer(part.to_owned()));
                    };
                    let index = stripped[..close]
                        .parse::<usize>()
                        .map_err(|_| FormError::NotAContainer(part.to_owned()))?;
                    segments.push(PathSegment::Index(index));
                    rest = &stripped[close + 1..];
                }
            } else {
                segments.push(PathSegment::Key(rest.to_owned()));
            }
        }

        if segments.is_empty() {
            return Err(FormError::EmptyPath);
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if position > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A flattened leaf of the form tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub path: FieldPath,
    pub value: Value,
}

impl FormField {
    /// Null, empty string or whitespace-only string count as unfilled.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Fill-progress counters shown next to the form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub total: usize,
    pub filled: usize,
    pub empty: usize,
}

/// The form side of the workspace: the JSON document plus the flattening
/// and lookup the viewer integration needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonForm {
    root: Value,
}

impl JsonForm {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// All leaf fields in document order. Objects and arrays are structure,
    /// not fields; everything else is a leaf. Location objects
    /// (`{page, bbox}`) are treated as leaves so a positioned field is one
    /// field, not two.
    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = Vec::new();
        flatten(&self.root, FieldPath::root(), &mut fields);
        fields
    }

    pub fn stats(&self) -> FieldStats {
        let fields = self.fields();
        let empty = fields.iter().filter(|field| field.is_empty()).count();
        FieldStats { total: fields.len(), filled: fields.len() - empty, empty }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let mut cursor = &self.root;
        for segment in path.segments() {
            cursor = match segment {
                PathSegment::Key(key) => cursor.get(key)?,
                PathSegment::Index(index) => cursor.get(index)?,
            };
        }
        Some(cursor)
    }

    /// Set a leaf value, creating intermediate objects along the path.
    /// Array segments must already exist; forms never grow arrays through
    /// an edit.
    pub fn set(&mut self, path: &FieldPath, value: Value) -> Result<(), FormError> {
        if path.segments().is_empty() {
            return Err(FormError::EmptyPath);
        }

        let mut cursor = &mut self.root;
        for segment in path.segments() {
            cursor = match segment {
                PathSegment::Key(key) => {
                    if !cursor.is_object() {
                        if cursor.is_null() {
                            *cursor = Value::Object(serde_json::Map::new());
                        } else {
                            return Err(FormError::NotAContainer(key.clone()));
                        }
                    }
                    match cursor.as_object_mut() {
                        Some(map) => map.entry(key.clone()).or_insert(Value::Null),
                        None => return Err(FormError::NotAContainer(key.clone())),
                    }
                }
                PathSegment::Index(index) => {
                    let Some(items) = cursor.as_array_mut() else {
                        return Err(FormError::NotAContainer(index.to_string()));
                    };
                    let len = items.len();
                    items
                        .get_mut(*index)
                        .ok_or(FormError::IndexOutOfBounds { index: *index, len })?
                }
            };
        }

        *cursor = value;
        Ok(())
    }

    /// What clicking the field hands to the viewer: an explicit location
    /// when the value carries one, the value itself when filled, and the
    /// field's own name as a last resort.
    pub fn field_ref(&self, path: &FieldPath) -> Option<FieldRef> {
        let value = self.get(path)?;

        if let Some(location) = location_ref(value) {
            return Some(location);
        }

        let filled = match value {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        };

        match filled {
            Some(text) => Some(FieldRef::Text(text)),
            None => path.field_name().map(FieldRef::from),
        }
    }
}

fn flatten(value: &Value, path: FieldPath, out: &mut Vec<FormField>) {
    if location_ref(value).is_some() {
        out.push(FormField { path, value: value.clone() });
        return;
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(child, path.child(key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(child, path.element(index), out);
            }
        }
        _ => out.push(FormField { path, value: value.clone() }),
    }
}

/// Recognize the `{page, bbox}` value shape the extractor emits for fields
/// it located on the page. `bbox` is `{x1, y1, x2, y2}` or a 4-element
/// array.
fn location_ref(value: &Value) -> Option<FieldRef> {
    let map = value.as_object()?;
    let page = map.get("page")?.as_u64()? as u32;
    let bbox = map.get("bbox")?;

    let rect = match bbox {
        Value::Array(items) if items.len() == 4 => {
            let mut coords = [0.0f32; 4];
            for (slot, item) in coords.iter_mut().zip(items) {
                *slot = item.as_f64()? as f32;
            }
            Rect::new(coords[0], coords[1], coords[2], coords[3])
        }
        Value::Object(fields) => Rect::new(
            fields.get("x1")?.as_f64()? as f32,
            fields.get("y1")?.as_f64()? as f32,
            fields.get("x2")?.as_f64()? as f32,
            fields.get("y2")?.as_f64()? as f32,
        ),
        _ => return None,
    };

    Some(FieldRef::Location { page, bbox: rect })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonForm {
        JsonForm::new(json!({
            "policyNumber": "POL123456789",
            "insured": {
                "name": "Dana Whitfield",
                "email": "",
            },
            "vehicles": [
                { "vin": "1HGCM82633A004352", "year": 2019 },
                { "vin": null, "year": null },
            ],
            "signature": {
                "page": 2,
                "bbox": { "x1": 100.0, "y1": 500.0, "x2": 300.0, "y2": 540.0 },
            },
        }))
    }

    #[test]
    fn flatten_walks_leaves_in_document_order() {
        let fields = sample().fields();
        let paths: Vec<String> = fields.iter().map(|field| field.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "policyNumber",
                "insured.name",
                "insured.email",
                "vehicles[0].vin",
                "vehicles[0].year",
                "vehicles[1].vin",
                "vehicles[1].year",
                "signature",
            ]
        );
    }

    #[test]
    fn stats_count_empty_and_filled_fields() {
        let stats = sample().stats();
        // email, both vehicle[1] fields empty; 8 leaves total.
        assert_eq!(stats, FieldStats { total: 8, filled: 5, empty: 3 });
    }

    #[test]
    fn filled_field_searches_by_value() {
        let form = sample();
        let path = FieldPath::parse("policyNumber").unwrap();
        assert_eq!(form.field_ref(&path), Some(FieldRef::Text("POL123456789".to_owned())));
    }

    #[test]
    fn empty_field_searches_by_name() {
        let form = sample();
        let path = FieldPath::parse("insured.email").unwrap();
        assert_eq!(form.field_ref(&path), Some(FieldRef::Text("email".to_owned())));

        // Null values fall back to the name too, skipping array indices.
        let path = FieldPath::parse("vehicles[1].vin").unwrap();
        assert_eq!(form.field_ref(&path), Some(FieldRef::Text("vin".to_owned())));
    }

    #[test]
    fn numeric_field_searches_by_rendered_value() {
        let form = sample();
        let path = FieldPath::parse("vehicles[0].year").unwrap();
        assert_eq!(form.field_ref(&path), Some(FieldRef::Text("2019".to_owned())));
    }

    #[test]
    fn location_value_becomes_explicit_ref() {
        let form = sample();
        let path = FieldPath::parse("signature").unwrap();
        assert_eq!(
            form.field_ref(&path),
            Some(FieldRef::Location {
                page: 2,
                bbox: Rect::new(100.0, 500.0, 300.0, 540.0)
            })
        );
    }

    #[test]
    fn location_bbox_accepts_array_form() {
        let form = JsonForm::new(json!({
            "stamp": { "page": 1, "bbox": [10.0, 20.0, 30.0, 40.0] }
        }));
        let path = FieldPath::parse("stamp").unwrap();
        assert_eq!(
            form.field_ref(&path),
            Some(FieldRef::Location { page: 1, bbox: Rect::new(10.0, 20.0, 30.0, 40.0) })
        );
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut form = JsonForm::new(json!({}));
        let path = FieldPath::parse("insured.address.city").unwrap();
        form.set(&path, json!("Springfield")).unwrap();

        assert_eq!(form.get(&path), Some(&json!("Springfield")));
        assert_eq!(form.stats().filled, 1);
    }

    #[test]
    fn set_rejects_out_of_bounds_array_index() {
        let mut form = sample();
        let path = FieldPath::parse("vehicles[5].vin").unwrap();
        assert!(matches!(
            form.set(&path, json!("X")),
            Err(FormError::IndexOutOfBounds { index: 5, len: 2 })
        ));
    }

    #[test]
    fn set_then_stats_reflects_the_edit() {
        let mut form = sample();
        let path = FieldPath::parse("insured.email").unwrap();
        form.set(&path, json!("dana@example.com")).unwrap();

        let stats = form.stats();
        assert_eq!(stats.empty, 2);
        assert_eq!(stats.filled, 6);
    }

    #[test]
    fn path_display_and_parse_round_trip() {
        for raw in ["policyNumber", "insured.name", "vehicles[0].vin", "a.b[2][3].c"] {
            let path = FieldPath::parse(raw).unwrap();
            assert_eq!(path.to_string(), raw);
        }
        assert!(FieldPath::parse("").is_err());
    }
}
