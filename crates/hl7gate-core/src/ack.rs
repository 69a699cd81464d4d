//! Acknowledgment generation.
//!
//! The accept path only needs a handful of header values, so this does a
//! positional split of the `MSH` line instead of a full [`decode`].
//!
//! [`decode`]: crate::decode

use crate::tree::HEADER_SEGMENT;

/// Header values needed to acknowledge a message.
///
/// Positions follow the split of the `MSH` line on the field separator, so
/// `MSH` itself is position 0 and the encoding characters are position 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub timestamp: String,
    pub message_type: String,
    pub control_id: String,
    pub version_id: String,
    component_separator: char,
}

impl HeaderFields {
    /// Extracts header values from a raw message.
    ///
    /// Returns `None` if the message contains no `MSH` segment. Positions
    /// missing from a short header are left empty.
    pub fn extract(message: &str) -> Option<Self> {
        let start = message.find(HEADER_SEGMENT)?;
        let header = &message[start..];
        let end = header.find(['\r', '\n']).unwrap_or(header.len());
        let header = &header[..end];

        let mut declared = header[HEADER_SEGMENT.len()..].chars();
        let separator = declared.next()?;
        let component_separator = declared.next().unwrap_or('^');

        let parts: Vec<&str> = header.split(separator).collect();
        let at = |index: usize| parts.get(index).copied().unwrap_or_default().to_string();

        Some(Self {
            sending_application: at(2),
            sending_facility: at(3),
            receiving_application: at(4),
            receiving_facility: at(5),
            timestamp: at(6),
            message_type: at(8),
            control_id: at(9),
            version_id: at(11),
            component_separator,
        })
    }

    /// Trigger event of the message type, e.g. `A03` for `ADT^A03`.
    pub fn trigger_event(&self) -> Option<&str> {
        self.message_type
            .split_once(self.component_separator)
            .map(|(_, trigger)| trigger)
    }

    /// Builds the accept acknowledgment for this header.
    ///
    /// Sender and receiver are swapped and the processing id is forced to
    /// `P`.
    pub fn to_ack(&self) -> String {
        let message_type = match self.trigger_event() {
            Some(trigger) => format!("ACK^{}", trigger),
            None => "ACK".to_string(),
        };
        format!(
            "MSH|^~\\&|{}|{}|{}|{}|{}||{}|{}|P|{}\rMSA|AA|{}",
            self.receiving_application,
            self.receiving_facility,
            self.sending_application,
            self.sending_facility,
            self.timestamp,
            message_type,
            self.control_id,
            self.version_id,
            self.control_id,
        )
    }
}

/// Creates the acknowledgment for a raw message, or `None` if it has no
/// header segment.
///
/// # Example
///
/// ```rust
/// use hl7gate_core::create_ack;
///
/// let ack = create_ack("MSH|^~\\&|LAB|H1|EMR|H2|20240101||ORU^R01|99|P|2.5\r").unwrap();
/// assert_eq!(ack, "MSH|^~\\&|EMR|H2|LAB|H1|20240101||ACK^R01|99|P|2.5\rMSA|AA|99");
/// ```
pub fn create_ack(message: &str) -> Option<String> {
    HeaderFields::extract(message).map(|header| header.to_ack())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_generate_ack() {
        let packet =
            "MSH|^~\\&|ADT|EPIC-PRD|QDXI|CHB|20120103161618||ADT^A03|12586919|P|2.3-CH|||NS";
        assert_eq!(
            create_ack(packet).unwrap(),
            "MSH|^~\\&|QDXI|CHB|ADT|EPIC-PRD|20120103161618||ACK^A03|12586919|P|2.3-CH\rMSA|AA|12586919"
        );
    }

    #[test]
    fn header_stops_at_segment_terminator() {
        let packet = "MSH|^~\\&|A|B|C|D|20200101||ORM^O01|7|T|2.4\rPID|1||x|y|z|w||q|r|s|t\r";
        let header = HeaderFields::extract(packet).unwrap();
        assert_eq!(header.control_id, "7");
        assert_eq!(header.version_id, "2.4");
        assert_eq!(header.trigger_event(), Some("O01"));
    }

    #[test]
    fn header_found_after_leading_noise() {
        let packet = "\r\nMSH|^~\\&|A|B|C|D|1||ADT^A01|5|P|2.3\r";
        let header = HeaderFields::extract(packet).unwrap();
        assert_eq!(header.sending_application, "A");
        assert_eq!(header.receiving_facility, "D");
    }

    #[test]
    fn missing_header_yields_none() {
        assert!(create_ack("PID|1||123").is_none());
        assert!(create_ack("").is_none());
        assert!(create_ack("MSH").is_none());
    }

    #[test]
    fn short_header_leaves_positions_empty() {
        let ack = create_ack("MSH|^~\\&|A|B\r").unwrap();
        assert_eq!(ack, "MSH|^~\\&|||A|B|||ACK||P|\rMSA|AA|");
    }

    #[test]
    fn declared_separator_is_used_for_splitting() {
        let header = HeaderFields::extract("MSH#*~\\&#A#B#C#D#T##ADT*A08#11#P#2.5").unwrap();
        assert_eq!(header.sending_application, "A");
        assert_eq!(header.trigger_event(), Some("A08"));
        assert_eq!(
            header.to_ack(),
            "MSH|^~\\&|C|D|A|B|T||ACK^A08|11|P|2.5\rMSA|AA|11"
        );
    }
}
