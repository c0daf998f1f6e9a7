pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod gather;
pub mod merge;
pub mod payload;
pub mod protocol;
mod sync_world;
pub mod tensor;
mod transport;
pub mod types;
mod world;

pub use backend::{Collective, HubBackend, LocalBackend, PendingHub, Solo};
pub use codec::{FlattenedTensor, Opaque, decode_opaque, encode_opaque, flatten, unflatten};
pub use config::WorldConfig;
pub use error::{GatherError, Result};
pub use gather::{
    all_gather, all_gather_elements, all_gather_opaque, all_gather_padded, all_gather_structured,
    all_gather_tensor,
};
pub use merge::{Merged, Partial, concat, merge_maps, merge_payloads, merge_results};
pub use payload::{GatherPayload, PayloadKind};
pub use sync_world::SyncWorld;
pub use tensor::{Shape, Tensor, TensorMap};
pub use types::{DataType, Element, Rank};
pub use world::{WorldContext, is_initialized};
