use crate::error::{GatherError, Result};
use crate::protocol::message::ControlMessage;

pub fn encode_message(msg: &ControlMessage) -> Result<Vec<u8>> {
    rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map(|bytes| bytes.to_vec())
        .map_err(|e| GatherError::SerializationFailure(e.to_string()))
}

pub fn decode_message(buf: &[u8]) -> Result<ControlMessage> {
    let mut aligned: rkyv::util::AlignedVec = rkyv::util::AlignedVec::with_capacity(buf.len());
    aligned.extend_from_slice(buf);
    rkyv::from_bytes::<ControlMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| GatherError::SerializationFailure(e.to_string()))
}
