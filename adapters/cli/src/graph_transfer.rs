//! Single-line transfer strings for support graph snapshots.
//!
//! A transfer string has the shape `barn:v1:<pieces>:<payload>` where the
//! payload is the JSON snapshot encoded with unpadded base64. The piece count
//! is repeated in clear text so a truncated paste is caught before decoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use barn_defence_system_structural_validator::SerializedGraph;
use thiserror::Error;

const TRANSFER_DOMAIN: &str = "barn";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the piece count and payload.
pub(crate) const TRANSFER_HEADER: &str = "barn:v1";
const FIELD_DELIMITER: char = ':';

/// Errors raised while decoding a transfer string.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The input was empty or contained only whitespace.
    #[error("transfer string was empty")]
    Empty,
    /// A required segment was missing.
    #[error("transfer string is missing the {0}")]
    MissingSegment(&'static str),
    /// The first segment named another format.
    #[error("transfer prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version segment is not understood.
    #[error("transfer version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The piece count could not be parsed.
    #[error("could not parse piece count '{0}'")]
    InvalidCount(String),
    /// The payload was not valid base64.
    #[error("could not decode transfer payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    /// The payload was not a valid snapshot.
    #[error("could not parse transfer payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    /// The clear-text piece count disagrees with the payload.
    #[error("transfer string announces {announced} pieces but carries {actual}")]
    CountMismatch {
        /// Count written in the header.
        announced: usize,
        /// Count found in the payload.
        actual: usize,
    },
}

/// Encodes a snapshot into a single-line transfer string.
pub(crate) fn encode(graph: &SerializedGraph) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(graph)?;
    let payload = STANDARD_NO_PAD.encode(json);
    Ok(format!("{TRANSFER_HEADER}:{}:{payload}", graph.pieces.len()))
}

/// Reports whether `value` looks like a transfer string rather than JSON.
pub(crate) fn is_transfer_string(value: &str) -> bool {
    value.trim_start().starts_with(TRANSFER_HEADER)
}

/// Decodes a transfer string back into a snapshot.
pub(crate) fn decode(value: &str) -> Result<SerializedGraph, TransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::Empty);
    }

    let mut parts = trimmed.splitn(4, FIELD_DELIMITER);
    let domain = parts.next().ok_or(TransferError::MissingSegment("prefix"))?;
    let version = parts.next().ok_or(TransferError::MissingSegment("version"))?;
    let count = parts
        .next()
        .ok_or(TransferError::MissingSegment("piece count"))?;
    let payload = parts.next().ok_or(TransferError::MissingSegment("payload"))?;

    if domain != TRANSFER_DOMAIN {
        return Err(TransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(TransferError::UnsupportedVersion(version.to_owned()));
    }
    let announced: usize = count
        .parse()
        .map_err(|_| TransferError::InvalidCount(count.to_owned()))?;

    let bytes = STANDARD_NO_PAD.decode(payload.as_bytes())?;
    let graph: SerializedGraph = serde_json::from_slice(&bytes)?;
    if graph.pieces.len() != announced {
        return Err(TransferError::CountMismatch {
            announced,
            actual: graph.pieces.len(),
        });
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use barn_defence_core::{EntityId, PieceKind, Position};
    use barn_defence_system_structural_validator::{SerializedEdge, SerializedPiece};

    fn tower() -> SerializedGraph {
        SerializedGraph {
            pieces: vec![
                SerializedPiece {
                    id: EntityId::new(1),
                    position: Some(Position::planar(10.0, 0.0)),
                    kind: PieceKind::Foundation,
                    is_grounded: true,
                },
                SerializedPiece {
                    id: EntityId::new(2),
                    position: Some(Position::new(11.5, 2.0, 0.0)),
                    kind: PieceKind::Wall,
                    is_grounded: false,
                },
            ],
            edges: vec![SerializedEdge {
                id: EntityId::new(1),
                supports: vec![EntityId::new(2)],
            }],
            grounded: vec![EntityId::new(1)],
        }
    }

    #[test]
    fn transfer_string_carries_header_and_count() {
        let encoded = encode(&tower()).expect("serializable");

        assert!(encoded.starts_with("barn:v1:2:"));
        assert!(is_transfer_string(&encoded));
        assert!(!encoded.contains('\n'));
        assert_eq!(decode(&encoded).expect("valid"), tower());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let encoded = format!("  {}\n", encode(&tower()).expect("serializable"));

        assert_eq!(decode(&encoded).expect("valid"), tower());
    }

    #[test]
    fn json_documents_are_not_transfer_strings() {
        assert!(!is_transfer_string("{\"pieces\": []}"));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert!(matches!(decode("   "), Err(TransferError::Empty)));
        assert!(matches!(
            decode("barn"),
            Err(TransferError::MissingSegment("version"))
        ));
        assert!(matches!(
            decode("fort:v1:0:e30"),
            Err(TransferError::InvalidPrefix(prefix)) if prefix == "fort"
        ));
        assert!(matches!(
            decode("barn:v9:0:e30"),
            Err(TransferError::UnsupportedVersion(version)) if version == "v9"
        ));
        assert!(matches!(
            decode("barn:v1:two:e30"),
            Err(TransferError::InvalidCount(_))
        ));
        assert!(matches!(
            decode("barn:v1:0:***"),
            Err(TransferError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn truncated_payload_is_caught_by_the_count() {
        let encoded = encode(&tower()).expect("serializable");
        let tampered = encoded.replacen("barn:v1:2:", "barn:v1:3:", 1);

        assert!(matches!(
            decode(&tampered),
            Err(TransferError::CountMismatch {
                announced: 3,
                actual: 2
            })
        ));
    }
}
