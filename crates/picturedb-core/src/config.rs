//! Store configuration

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default database name
pub const DEFAULT_DATABASE_NAME: &str = "PictureDB";

/// Default schema version
pub const DEFAULT_DATABASE_VERSION: u32 = 1;

/// Default record collection (object store) name
pub const DEFAULT_COLLECTION_NAME: &str = "images";

/// Which database to open and which collection holds the images.
///
/// Fixed for the lifetime of an [`ImageStore`](crate::ImageStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the database
    pub database_name: String,
    /// Schema version requested when opening
    pub database_version: u32,
    /// Name of the record collection
    pub collection_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            database_version: DEFAULT_DATABASE_VERSION,
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(
        database_name: impl Into<String>,
        database_version: u32,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            database_version,
            collection_name: collection_name.into(),
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the underlying store would refuse to open.
    pub fn validate(&self) -> StoreResult<()> {
        if self.database_name.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "database name must not be empty".into(),
            ));
        }
        if self.collection_name.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "collection name must not be empty".into(),
            ));
        }
        // IndexedDB rejects version 0 with a TypeError
        if self.database_version == 0 {
            return Err(StoreError::InvalidConfig(
                "database version must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
