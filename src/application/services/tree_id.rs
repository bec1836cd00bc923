//! Tree identifier generation for multi-tree mode

use tracing::debug;
use uuid::Uuid;

use crate::application::ApplicationResult;
use crate::domain::{FieldType, TreeError, TreeId};
use crate::infrastructure::traits::RowStore;

/// Strategy producing fresh tree ids, chosen once from the tree id column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeIdGenerator {
    /// Largest integer id in use plus one
    Sequential,
    /// UUID v7
    TimeOrderedUuid,
    /// 128 random bits as 32 lowercase hex digits
    RandomHex,
}

impl TreeIdGenerator {
    pub fn for_field(field: FieldType) -> Result<Self, TreeError> {
        match field {
            f if f.is_integer() => Ok(Self::Sequential),
            FieldType::Uuid => Ok(Self::TimeOrderedUuid),
            FieldType::Ulid => Ok(Self::RandomHex),
            other => Err(TreeError::UnsupportedFieldType(other)),
        }
    }

    /// A tree id not currently used by any row of `store`.
    ///
    /// The sequential variant reads the current maximum, so concurrent root
    /// creation must be serialized by the caller's transaction.
    pub fn generate<S: RowStore>(&self, store: &S) -> ApplicationResult<TreeId> {
        let id = match self {
            Self::Sequential => TreeId::Int(store.max_tree_id()?.map_or(1, |max| max + 1)),
            Self::TimeOrderedUuid => TreeId::Uuid(Uuid::now_v7()),
            Self::RandomHex => TreeId::Hex(hex::encode(rand::random::<[u8; 16]>())),
        };
        debug!("generated tree id {id}");
        Ok(id)
    }
}
