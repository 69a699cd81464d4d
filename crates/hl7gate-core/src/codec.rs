//! Structural codec between the delimited wire format and [`Document`].
//!
//! Decoding reads the delimiters declared in the header, then scans the rest
//! of the message once, turning every character into either literal text or
//! a structural token. The escape character makes the next character
//! literal, so an escaped separator never splits anything. The token stream
//! is then split level by level: segments, fields, repeats, components,
//! subcomponents.
//!
//! Encoding walks the tree depth first and joins siblings with the
//! separator for their depth. Adjacent fields with the same name are repeats
//! and are joined with the repeat separator instead.

use crate::error::{CodecResult, FormatError};
use crate::tree::{
    Component, ComponentValue, Document, Encoding, Field, FieldValue, HEADER_SEGMENT, Segment,
    Subcomponent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Text(char),
    Segment,
    Field,
    Repeat,
    Component,
    Subcomponent,
}

/// Decodes a wire message into a tree.
///
/// # Errors
///
/// Returns a [`FormatError`] if the message does not start with `MSH` or the
/// encoding characters that follow are malformed. No partial tree is
/// returned.
///
/// # Example
///
/// ```rust
/// use hl7gate_core::{decode, encode};
///
/// let doc = decode("MSH|^~\\&|LAB\rPID|1||42^^^HOSP").unwrap();
/// assert_eq!(doc.get("PID.3.4"), Some("HOSP"));
/// assert_eq!(encode(&doc), "MSH|^~\\&|LAB\rPID|1||42^^^HOSP\r");
/// ```
pub fn decode(message: &str) -> CodecResult<Document> {
    let Some(rest) = message.strip_prefix(HEADER_SEGMENT) else {
        return Err(FormatError::MissingHeader {
            expected: HEADER_SEGMENT,
        });
    };

    let mut chars = rest.chars();
    let mut preamble = ['\0'; 6];
    for (available, slot) in preamble.iter_mut().enumerate() {
        *slot = chars
            .next()
            .ok_or(FormatError::TruncatedEncoding { available })?;
    }
    let [field, component, repeat, escape, subcomponent, check] = preamble;
    if check != field {
        return Err(FormatError::EncodingMismatch {
            expected: field,
            found: check,
        });
    }

    let encoding = Encoding {
        field,
        component,
        repeat,
        escape,
        subcomponent,
    };
    let tokens = tokenize(chars.as_str(), &encoding);

    let mut document = Document::new(Some(encoding));
    let mut segments = tokens.split(|t| *t == Token::Segment);

    // The header's separators were consumed above; its first stored field is MSH.3.
    let mut header = Segment::new(HEADER_SEGMENT);
    for (offset, tokens) in segments.next().unwrap_or(&[]).split(|t| *t == Token::Field).enumerate() {
        push_field(&mut header, offset + 3, tokens);
    }
    document.segments.push(header);

    for tokens in segments.filter(|s| !s.is_empty()) {
        let mut fields = tokens.split(|t| *t == Token::Field);
        let mut segment = Segment::new(text_of(fields.next().unwrap_or(&[])));
        for (offset, tokens) in fields.enumerate() {
            push_field(&mut segment, offset + 1, tokens);
        }
        document.segments.push(segment);
    }

    Ok(document)
}

fn tokenize(text: &str, encoding: &Encoding) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(text.len());
    let mut chars = text.chars().filter(|&c| c != '\n');

    while let Some(ch) = chars.next() {
        let token = match ch {
            c if c == encoding.escape => match chars.next() {
                Some(literal) => Token::Text(literal),
                None => break,
            },
            '\r' => Token::Segment,
            c if c == encoding.field => Token::Field,
            c if c == encoding.repeat => Token::Repeat,
            c if c == encoding.component => Token::Component,
            c if c == encoding.subcomponent => Token::Subcomponent,
            c => Token::Text(c),
        };
        tokens.push(token);
    }
    tokens
}

fn text_of(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Text(c) => Some(*c),
            _ => None,
        })
        .collect()
}

fn push_field(segment: &mut Segment, position: usize, tokens: &[Token]) {
    let name = segment.field_name(position);
    for repeat in tokens.split(|t| *t == Token::Repeat) {
        let value = field_value(&name, repeat);
        segment.fields.push(Field {
            name: name.clone(),
            value,
        });
    }
}

fn field_value(name: &str, tokens: &[Token]) -> FieldValue {
    let parts: Vec<&[Token]> = tokens.split(|t| *t == Token::Component).collect();
    if parts.len() == 1 && !tokens.contains(&Token::Subcomponent) {
        return FieldValue::Text(text_of(tokens));
    }

    let components = parts
        .into_iter()
        .enumerate()
        .map(|(index, tokens)| {
            let name = format!("{}.{}", name, index + 1);
            let value = component_value(&name, tokens);
            Component { name, value }
        })
        .collect();
    FieldValue::Components(components)
}

fn component_value(name: &str, tokens: &[Token]) -> ComponentValue {
    if !tokens.contains(&Token::Subcomponent) {
        return ComponentValue::Text(text_of(tokens));
    }

    let subcomponents = tokens
        .split(|t| *t == Token::Subcomponent)
        .enumerate()
        .map(|(index, tokens)| Subcomponent {
            name: format!("{}.{}", name, index + 1),
            text: text_of(tokens),
        })
        .collect();
    ComponentValue::Subcomponents(subcomponents)
}

/// Encodes a tree back into wire format.
///
/// Delimiters come from the document's encoding, or the standard `|^~\&`
/// set when it has none. Every segment is terminated by a carriage return.
/// Delimiter characters found in leaf text are escaped so that decoding the
/// output yields the same text. Line feeds are not part of the wire format
/// and are dropped from leaf text. A segment without fields is written as its
/// bare name.
pub fn encode(document: &Document) -> String {
    let encoding = document.encoding_or_default();
    let mut out = String::new();

    for (index, segment) in document.segments.iter().enumerate() {
        out.push_str(&segment.name);
        if index == 0 && segment.is_header() {
            out.push(encoding.field);
            out.push_str(&encoding.header_characters());
            out.push(encoding.field);
        } else if !segment.fields.is_empty() {
            out.push(encoding.field);
        }
        write_fields(&mut out, &segment.fields, &encoding);
        out.push('\r');
    }
    out
}

fn write_fields(out: &mut String, fields: &[Field], encoding: &Encoding) {
    let mut previous: Option<&str> = None;
    for field in fields {
        if let Some(previous) = previous {
            out.push(if previous == field.name {
                encoding.repeat
            } else {
                encoding.field
            });
        }
        match &field.value {
            FieldValue::Text(text) => escape_into(out, text, encoding),
            FieldValue::Components(components) => {
                write_components(out, components, encoding)
            }
        }
        previous = Some(&field.name);
    }
}

fn write_components(out: &mut String, components: &[Component], encoding: &Encoding) {
    for (index, component) in components.iter().enumerate() {
        if index > 0 {
            out.push(encoding.component);
        }
        match &component.value {
            ComponentValue::Text(text) => escape_into(out, text, encoding),
            ComponentValue::Subcomponents(subcomponents) => {
                for (index, sub) in subcomponents.iter().enumerate() {
                    if index > 0 {
                        out.push(encoding.subcomponent);
                    }
                    escape_into(out, &sub.text, encoding);
                }
            }
        }
    }
}

fn escape_into(out: &mut String, text: &str, encoding: &Encoding) {
    // Decoding drops line feeds, escaped or not.
    for ch in text.chars().filter(|&c| c != '\n') {
        if ch == '\r' || encoding.is_delimiter(ch) {
            out.push(encoding.escape);
        }
        out.push(ch);
    }
}
