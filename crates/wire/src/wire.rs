// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing, async and blocking.

use crate::message::{Command, Status};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame. Control messages are tiny; anything
/// larger indicates a desynchronized or corrupt channel.
pub const MAX_FRAME: usize = 1024 * 1024;

/// Errors from the control channel codec.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame of {0} bytes exceeds the {MAX_FRAME} byte cap")]
    FrameTooLarge(usize),

    #[error("encode/decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(err)
        }
    }
}

/// Serialize a message to its JSON payload (no length prefix).
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserialize a JSON payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Write one length-prefixed frame.
pub async fn write_message<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Send a daemon→worker command.
pub async fn send_command<W>(writer: &mut W, command: &Command) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    write_message(writer, &encode(command)?).await
}

/// Receive a worker→daemon status.
pub async fn recv_status<R>(reader: &mut R) -> Result<Status, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    decode(&read_message(reader).await?)
}

/// Send a worker→daemon status (async side; used by tests and tooling).
pub async fn send_status<W>(writer: &mut W, status: &Status) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    write_message(writer, &encode(status)?).await
}

/// Receive a daemon→worker command (async side; used by tests and tooling).
pub async fn recv_command<R>(reader: &mut R) -> Result<Command, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    decode(&read_message(reader).await?)
}

/// Blocking codec for the worker side of the channel.
pub mod blocking {
    use super::{ProtocolError, MAX_FRAME};
    use crate::message::{Command, Status};
    use std::io::{Read, Write};

    pub fn write_message<W: Write>(
        writer: &mut W,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        if payload.len() > MAX_FRAME {
            return Err(ProtocolError::FrameTooLarge(payload.len()));
        }
        writer.write_all(&(payload.len() as u32).to_be_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_message<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME {
            return Err(ProtocolError::FrameTooLarge(len));
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    pub fn send_status<W: Write>(writer: &mut W, status: &Status) -> Result<(), ProtocolError> {
        write_message(writer, &super::encode(status)?)
    }

    pub fn recv_command<R: Read>(reader: &mut R) -> Result<Command, ProtocolError> {
        super::decode(&read_message(reader)?)
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
