use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use vista_core::AssetId;

/// Binary object storage. Assets are write-once.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Fetchable URL of an existing asset.
    async fn url_for(&self, asset_id: AssetId) -> Result<String, StorageError>;

    /// Store a new asset and return its id.
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<AssetId, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("asset not found: {0}")]
    NotFound(AssetId),
    #[error("object storage error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory object storage serving URLs under `base_url`.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    base_url: String,
    objects: RwLock<HashMap<AssetId, StoredObject>>,
}

impl InMemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, asset_id: AssetId) -> Option<StoredObject> {
        self.objects.read().ok()?.get(&asset_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new("memory://assets")
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn url_for(&self, asset_id: AssetId) -> Result<String, StorageError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StorageError::Backend("storage lock poisoned".to_string()))?;
        if !objects.contains_key(&asset_id) {
            return Err(StorageError::NotFound(asset_id));
        }
        Ok(format!("{}/{}", self.base_url, asset_id))
    }

    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<AssetId, StorageError> {
        let asset_id = AssetId::new();
        self.objects
            .write()
            .map_err(|_| StorageError::Backend("storage lock poisoned".to_string()))?
            .insert(
                asset_id,
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        Ok(asset_id)
    }
}
