use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use vista_core::ResourceId;

/// Content-layer records that job results are written back onto.
#[async_trait]
pub trait TargetResourceStore: Send + Sync + 'static {
    /// Merge `fields` into the target (or into its sub-item when `sub_target` is set).
    async fn write_fields(
        &self,
        target: ResourceId,
        sub_target: Option<ResourceId>,
        fields: Map<String, JsonValue>,
    ) -> Result<(), TargetStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetStoreError {
    #[error("target resource not found: {0}")]
    NotFound(ResourceId),
    #[error("target store error: {0}")]
    Backend(String),
}

type TargetKey = (ResourceId, Option<ResourceId>);

#[derive(Debug, Default)]
pub struct InMemoryTargetStore {
    records: RwLock<HashMap<TargetKey, Map<String, JsonValue>>>,
}

impl InMemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields written so far for a target/sub-target pair.
    pub fn fields(&self, target: ResourceId, sub_target: Option<ResourceId>) -> Option<Map<String, JsonValue>> {
        self.records.read().ok()?.get(&(target, sub_target)).cloned()
    }
}

#[async_trait]
impl TargetResourceStore for InMemoryTargetStore {
    async fn write_fields(
        &self,
        target: ResourceId,
        sub_target: Option<ResourceId>,
        fields: Map<String, JsonValue>,
    ) -> Result<(), TargetStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| TargetStoreError::Backend("target store lock poisoned".to_string()))?;
        records.entry((target, sub_target)).or_default().extend(fields);
        Ok(())
    }
}
