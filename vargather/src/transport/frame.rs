//! Length-prefixed frames on QUIC streams: `[len: u64 LE][payload]`.

use crate::error::{GatherError, Result};

/// Upper bound on a single frame. Anything larger is treated as a corrupt
/// length prefix rather than allocated.
pub(crate) const MAX_FRAME_BYTES: u64 = 4 << 30;

pub(crate) fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

pub(crate) async fn write_frame(send: &mut quinn::SendStream, payload: &[u8]) -> Result<()> {
    send.write_all(&(payload.len() as u64).to_le_bytes())
        .await
        .map_err(|e| GatherError::transport_with_source("write frame length", e))?;
    send.write_all(payload)
        .await
        .map_err(|e| GatherError::transport_with_source("write frame payload", e))?;
    Ok(())
}

pub(crate) async fn read_frame(recv: &mut quinn::RecvStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 8];
    recv.read_exact(&mut len_buf)
        .await
        .map_err(|e| GatherError::transport_with_source("read frame length", e))?;
    let len = u64::from_le_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(GatherError::transport(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_BYTES}"
        )));
    }
    let mut payload = vec![0u8; len as usize];
    recv.read_exact(&mut payload)
        .await
        .map_err(|e| GatherError::transport_with_source("read frame payload", e))?;
    Ok(payload)
}
