//! The wire protocol: length-prefixed bincode frames.
//!
//! Every message is a u32 big-endian byte length followed by the bincode
//! payload. One request and one response per connection turnaround; the
//! request set is small and self-contained, so a host needs no session
//! state at all.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};

use forma_diagnostic::Diagnostic;
use forma_ir::{RefId, TypeUnit};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::HostError;

/// Frames beyond this are refused before allocation. Generous for unit
/// batches, tight enough that a garbage length prefix cannot balloon memory.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// What a client may ask of a host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Liveness and version probe.
    Ping,
    /// Compile a unit batch against a reference set.
    Compile {
        units: Vec<TypeUnit>,
        references: BTreeSet<RefId>,
    },
    /// Ask the host process to stop accepting and exit.
    Shutdown,
}

/// What a host answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Pong {
        version: String,
    },
    /// Encoded artifact bytes plus the compile warnings, lifted out so a
    /// client can log them without decoding the artifact first.
    Compiled {
        artifact: Vec<u8>,
        warnings: Vec<Diagnostic>,
    },
    Rejected {
        diagnostics: Vec<Diagnostic>,
    },
    ShuttingDown,
}

/// Serialize and frame one message.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), HostError> {
    let payload = bincode::serialize(message).map_err(|e| HostError::Frame(e.to_string()))?;
    write_frame(writer, &payload)?;
    Ok(())
}

/// Read and decode one framed message.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, HostError> {
    let payload = read_frame(reader)?;
    bincode::deserialize(&payload).map_err(|e| HostError::Frame(e.to_string()))
}

fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame length exceeds limit",
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use forma_ir::TypeName;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn messages_round_trip_through_a_frame() {
        let request = Request::Compile {
            units: vec![TypeUnit::new(TypeName::from("Point"))],
            references: [RefId::from("std.math")].into_iter().collect(),
        };

        let mut wire = Vec::new();
        write_message(&mut wire, &request).unwrap();
        // Four length bytes plus at least one payload byte.
        assert!(wire.len() > 4);

        let decoded: Request = read_message(&mut Cursor::new(wire)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn truncated_frames_are_io_errors() {
        let mut wire = Vec::new();
        write_message(&mut wire, &Request::Ping).unwrap();
        wire.truncate(wire.len() - 1);

        let result: Result<Request, HostError> = read_message(&mut Cursor::new(wire));
        assert!(matches!(result, Err(HostError::Io(_))));
    }

    #[test]
    fn oversized_length_prefixes_are_refused() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&u32::MAX.to_be_bytes());
        wire.extend_from_slice(&[0u8; 16]);

        let result: Result<Request, HostError> = read_message(&mut Cursor::new(wire));
        assert!(matches!(result, Err(HostError::Io(ref e)) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[test]
    fn garbage_payloads_are_frame_errors() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&4u32.to_be_bytes());
        wire.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let result: Result<Response, HostError> = read_message(&mut Cursor::new(wire));
        assert!(matches!(result, Err(HostError::Frame(_))));
    }
}
