//! Message tools: parse, encode, ack, send.

use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hl7gate_core::{Document, create_ack, decode, encode};

use crate::client::GatewayClient;
use crate::error::{CliError, CliResult};

/// Reads a file, or stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> CliResult<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// Turns `\r\n` and `\n` line endings into segment terminators.
pub fn normalize_segments(input: &str) -> String {
    input.replace("\r\n", "\r").replace('\n', "\r")
}

/// Renders wire text for a terminal, one segment per line.
fn for_terminal(wire: &str, raw: bool) -> String {
    if raw {
        wire.to_string()
    } else {
        wire.trim_end_matches('\r').replace('\r', "\n")
    }
}

fn emit(text: &str, raw: bool) {
    if raw {
        print!("{}", text);
    } else {
        println!("{}", text);
    }
}

/// Decodes a message into its JSON tree.
pub fn parse_to_json(input: &str, compact: bool) -> CliResult<String> {
    let document = decode(&normalize_segments(input))?;
    let json = if compact {
        serde_json::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };
    Ok(json)
}

/// Encodes a JSON tree into wire text.
pub fn encode_from_json(input: &str, raw: bool) -> CliResult<String> {
    let document: Document = serde_json::from_str(input)?;
    Ok(for_terminal(&encode(&document), raw))
}

/// Builds the acknowledgment for a message.
pub fn ack_for(input: &str, raw: bool) -> CliResult<String> {
    let ack = create_ack(&normalize_segments(input)).ok_or(CliError::NoHeader)?;
    Ok(for_terminal(&ack, raw))
}

/// `hl7gate parse`
pub fn parse(file: Option<&Path>, compact: bool) -> CliResult<()> {
    let json = parse_to_json(&read_input(file)?, compact)?;
    println!("{}", json);
    Ok(())
}

/// `hl7gate encode`
pub fn encode_tree(file: Option<&Path>, raw: bool) -> CliResult<()> {
    let wire = encode_from_json(&read_input(file)?, raw)?;
    emit(&wire, raw);
    Ok(())
}

/// `hl7gate ack`
pub fn ack(file: Option<&Path>, raw: bool) -> CliResult<()> {
    let ack = ack_for(&read_input(file)?, raw)?;
    emit(&ack, raw);
    Ok(())
}

/// `hl7gate send`
pub async fn send(to: SocketAddr, file: Option<&Path>, timeout_secs: u64) -> CliResult<()> {
    let message = normalize_segments(&read_input(file)?);
    if create_ack(&message).is_none() {
        return Err(CliError::NoHeader);
    }

    let client = GatewayClient::new(to, Duration::from_secs(timeout_secs));
    let ack = client.send(&message).await?;
    println!("{}", for_terminal(&ack, false));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = "MSH|^~\\&|ADT|EPIC-PRD|QDXI|CHB|20120103161618||ADT^A03|12586919|P|2.3-CH|||NS\nPID|1||123^^^MRN||DOE^JANE\n";

    #[test]
    fn normalizes_line_endings() {
        assert_eq!(normalize_segments("A\r\nB\nC\r"), "A\rB\rC\r");
    }

    #[test]
    fn parse_then_encode_restores_message() {
        let json = parse_to_json(MESSAGE, true).unwrap();
        let wire = encode_from_json(&json, true).unwrap();
        assert_eq!(wire, normalize_segments(MESSAGE));

        let lines = encode_from_json(&json, false).unwrap();
        assert_eq!(lines, MESSAGE.trim_end());
    }

    #[test]
    fn parse_reports_bad_header() {
        assert!(matches!(
            parse_to_json("PID|1", false),
            Err(CliError::Format(_))
        ));
    }

    #[test]
    fn encode_reports_bad_json() {
        assert!(matches!(
            encode_from_json("{\"segments\": 3}", false),
            Err(CliError::Json(_))
        ));
    }

    #[test]
    fn ack_for_message() {
        assert_eq!(
            ack_for(MESSAGE, false).unwrap(),
            "MSH|^~\\&|QDXI|CHB|ADT|EPIC-PRD|20120103161618||ACK^A03|12586919|P|2.3-CH\nMSA|AA|12586919"
        );
        assert!(ack_for(MESSAGE, true).unwrap().contains("\rMSA|AA|12586919"));
        assert!(matches!(ack_for("nothing here", false), Err(CliError::NoHeader)));
    }

    #[test]
    fn read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.hl7");
        std::fs::write(&path, MESSAGE).unwrap();
        assert_eq!(read_input(Some(path.as_path())).unwrap(), MESSAGE);
        assert!(matches!(
            read_input(Some(dir.path().join("missing").as_path())),
            Err(CliError::Io(_))
        ));
    }
}
