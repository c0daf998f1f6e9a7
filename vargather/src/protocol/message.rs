use crate::types::Rank;

/// Control messages exchanged while the hub group forms.
///
/// Gather payloads never flow through this enum; they travel as raw frames
/// on per-call streams.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// First message from a non-hub rank.
    Hello {
        protocol_version: u16,
        rank: Rank,
        world_size: u32,
    },

    /// Hub's answer once every rank has joined.
    Welcome { world_size: u32 },
}
