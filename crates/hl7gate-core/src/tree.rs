//! Ordered message tree.
//!
//! A decoded message is a [`Document`] holding [`Segment`]s, which hold
//! [`Field`]s, which hold either text or [`Component`]s, which in turn hold
//! either text or [`Subcomponent`]s:
//!
//! ```text
//! Document
//! ├── Encoding (optional, per-document delimiters)
//! └── Segment "PID"
//!     ├── Field "PID.3"           text "12345"
//!     ├── Field "PID.5"           components
//!     │   ├── Component "PID.5.1" text "DOE"
//!     │   └── Component "PID.5.2" subcomponents
//!     │       ├── Subcomponent "PID.5.2.1"
//!     │       └── Subcomponent "PID.5.2.2"
//!     └── Field "PID.5"           (a repeat of the previous field)
//! ```
//!
//! Repeats of a field are stored as adjacent fields sharing the same name.
//! The tree derives serde traits so it can be exported for inspection and
//! loaded back for re-encoding.

use serde::{Deserialize, Serialize};

/// Name of the header segment every message starts with.
pub const HEADER_SEGMENT: &str = "MSH";

/// The five delimiter characters a message declares in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Separates fields within a segment.
    pub field: char,
    /// Separates components within a field.
    pub component: char,
    /// Separates repeats of a field.
    pub repeat: char,
    /// Makes the following character literal.
    pub escape: char,
    /// Separates subcomponents within a component.
    pub subcomponent: char,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repeat: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Encoding {
    /// Returns true if `ch` has structural meaning under this encoding.
    pub fn is_delimiter(&self, ch: char) -> bool {
        ch == self.field
            || ch == self.component
            || ch == self.repeat
            || ch == self.escape
            || ch == self.subcomponent
    }

    /// The encoding characters as they appear in the header, after the
    /// leading field separator: component, repeat, escape, subcomponent.
    pub fn header_characters(&self) -> String {
        [self.component, self.repeat, self.escape, self.subcomponent]
            .iter()
            .collect()
    }
}

/// Root of a decoded message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Delimiters this document was decoded with. `None` means defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    /// Segments in message order.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Document {
    /// Creates an empty document with the given encoding.
    pub fn new(encoding: Option<Encoding>) -> Self {
        Self {
            encoding,
            segments: Vec::new(),
        }
    }

    /// Delimiters to use for this document, falling back to defaults.
    pub fn encoding_or_default(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }

    /// Returns the first segment with the given name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Returns every segment with the given name, in order.
    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> {
        self.segments.iter().filter(move |s| s.name == name)
    }

    /// Returns the header segment, if present.
    pub fn header(&self) -> Option<&Segment> {
        self.segment(HEADER_SEGMENT)
    }

    /// Looks up a text value by terse path.
    ///
    /// Paths look like `PID.5`, `PID.5.1` or `PID.5.2.1`: segment name, field
    /// position, then optional 1-based component and subcomponent positions.
    /// Only the first segment and first repeat are consulted. A text field
    /// answers for component 1 and a text component answers for
    /// subcomponent 1.
    ///
    /// ```rust
    /// use hl7gate_core::decode;
    ///
    /// let doc = decode("MSH|^~\\&|APP\rPID|1||123||DOE^JOHN").unwrap();
    /// assert_eq!(doc.get("PID.5.2"), Some("JOHN"));
    /// assert_eq!(doc.get("MSH.3"), Some("APP"));
    /// ```
    pub fn get(&self, path: &str) -> Option<&str> {
        let mut parts = path.split('.');
        let segment = self.segment(parts.next()?)?;
        let field = segment.field(parts.next()?.parse().ok()?)?;

        let Some(component) = parts.next() else {
            return field.text();
        };
        let component: usize = component.parse().ok()?;

        let Some(subcomponent) = parts.next() else {
            return field.component_text(component);
        };
        let subcomponent: usize = subcomponent.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        field.subcomponent_text(component, subcomponent)
    }
}

/// A named segment such as `MSH` or `PID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identifier.
    pub name: String,
    /// Fields in wire order. Repeats are adjacent fields with the same name.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Segment {
    /// Creates a segment without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Returns true for the `MSH` header segment.
    pub fn is_header(&self) -> bool {
        self.name == HEADER_SEGMENT
    }

    /// Name given to the field at `position`, e.g. `PID.5`.
    pub fn field_name(&self, position: usize) -> String {
        format!("{}.{}", self.name, position)
    }

    /// Returns the first occurrence of the field at `position`.
    pub fn field(&self, position: usize) -> Option<&Field> {
        self.repeats(position).next()
    }

    /// Returns every repeat of the field at `position`.
    pub fn repeats(&self, position: usize) -> impl Iterator<Item = &Field> {
        let name = self.field_name(position);
        self.fields.iter().filter(move |f| f.name == name)
    }
}

/// One occurrence of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// `<SEGMENT>.<position>`.
    pub name: String,
    /// Literal text or exploded components.
    pub value: FieldValue,
}

/// Content of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Components(Vec<Component>),
}

impl Field {
    /// Creates a text field.
    pub fn text_field(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(text.into()),
        }
    }

    /// Returns the literal text of a field that was not exploded.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(text) => Some(text),
            FieldValue::Components(_) => None,
        }
    }

    /// Returns the components, or an empty slice for a text field.
    pub fn components(&self) -> &[Component] {
        match &self.value {
            FieldValue::Text(_) => &[],
            FieldValue::Components(components) => components,
        }
    }

    /// Text of the 1-based component `position`.
    pub fn component_text(&self, position: usize) -> Option<&str> {
        match &self.value {
            FieldValue::Text(text) if position == 1 => Some(text),
            FieldValue::Text(_) => None,
            FieldValue::Components(components) => components.get(position.checked_sub(1)?)?.text(),
        }
    }

    /// Text of the 1-based subcomponent inside the 1-based component.
    pub fn subcomponent_text(&self, component: usize, subcomponent: usize) -> Option<&str> {
        match &self.value {
            FieldValue::Text(text) if component == 1 && subcomponent == 1 => Some(text),
            FieldValue::Text(_) => None,
            FieldValue::Components(components) => components
                .get(component.checked_sub(1)?)?
                .subcomponent_text(subcomponent),
        }
    }
}

/// A component of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// `<SEGMENT>.<field>.<position>`.
    pub name: String,
    /// Literal text or exploded subcomponents.
    pub value: ComponentValue,
}

/// Content of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentValue {
    Text(String),
    Subcomponents(Vec<Subcomponent>),
}

impl Component {
    /// Returns the literal text of a component that was not exploded.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            ComponentValue::Text(text) => Some(text),
            ComponentValue::Subcomponents(_) => None,
        }
    }

    fn subcomponent_text(&self, position: usize) -> Option<&str> {
        match &self.value {
            ComponentValue::Text(text) if position == 1 => Some(text),
            ComponentValue::Text(_) => None,
            ComponentValue::Subcomponents(subs) => {
                subs.get(position.checked_sub(1)?).map(|s| s.text.as_str())
            }
        }
    }
}

/// Leaf of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcomponent {
    /// `<SEGMENT>.<field>.<component>.<position>`.
    pub name: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            encoding: None,
            segments: vec![Segment {
                name: "PID".into(),
                fields: vec![
                    Field::text_field("PID.1", "1"),
                    Field {
                        name: "PID.5".into(),
                        value: FieldValue::Components(vec![
                            Component {
                                name: "PID.5.1".into(),
                                value: ComponentValue::Text("DOE".into()),
                            },
                            Component {
                                name: "PID.5.2".into(),
                                value: ComponentValue::Subcomponents(vec![
                                    Subcomponent {
                                        name: "PID.5.2.1".into(),
                                        text: "JOHN".into(),
                                    },
                                    Subcomponent {
                                        name: "PID.5.2.2".into(),
                                        text: "Q".into(),
                                    },
                                ]),
                            },
                        ]),
                    },
                    Field::text_field("PID.5", "ALIAS"),
                ],
            }],
        }
    }

    #[test]
    fn default_encoding_is_standard_set() {
        let enc = Encoding::default();
        assert_eq!(enc.field, '|');
        assert_eq!(enc.header_characters(), "^~\\&");
        assert!(enc.is_delimiter('&'));
        assert!(!enc.is_delimiter('A'));
    }

    #[test]
    fn get_walks_terse_paths() {
        let doc = sample();
        assert_eq!(doc.get("PID.1"), Some("1"));
        assert_eq!(doc.get("PID.1.1"), Some("1"));
        assert_eq!(doc.get("PID.1.2"), None);
        assert_eq!(doc.get("PID.5.1"), Some("DOE"));
        assert_eq!(doc.get("PID.5.1.1"), Some("DOE"));
        assert_eq!(doc.get("PID.5.2.2"), Some("Q"));
        assert_eq!(doc.get("PID.5"), None);
        assert_eq!(doc.get("PID.9"), None);
        assert_eq!(doc.get("PV1.1"), None);
        assert_eq!(doc.get("PID.x"), None);
        assert_eq!(doc.get("PID.5.2.1.1"), None);
    }

    #[test]
    fn repeats_are_grouped_by_name() {
        let doc = sample();
        let pid = doc.segment("PID").unwrap();
        assert_eq!(pid.repeats(5).count(), 2);
        assert_eq!(pid.repeats(5).nth(1).unwrap().text(), Some("ALIAS"));
        assert!(pid.field(5).unwrap().text().is_none());
        assert_eq!(pid.field(5).unwrap().components().len(), 2);
    }

    #[test]
    fn encoding_defaults_when_absent() {
        let doc = Document::default();
        assert_eq!(doc.encoding_or_default(), Encoding::default());
        assert!(doc.header().is_none());
    }
}
