use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::error::{Result, StoreError};
use super::keys::{decode_pass_key, encode_image_key, encode_pass_key};
use crate::model::{ImageSlot, PassImages, PassType, UnifiedPass};

/// Fjall-backed local storage for imported passes
pub struct PassStore {
    keyspace: Keyspace,
    passes: PartitionHandle,
    images: PartitionHandle,
    /// Serializes check-then-write so ids stay unique
    write_lock: Mutex<()>,
}

/// List entry without image bytes
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub id: String,
    pub pass_type: PassType,
    pub title: String,
    pub organization_name: String,
    pub format_name: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub voided: bool,
}

impl From<&UnifiedPass> for PassSummary {
    fn from(pass: &UnifiedPass) -> Self {
        Self {
            id: pass.id.clone(),
            pass_type: pass.pass_type,
            title: pass.title.clone(),
            organization_name: pass.organization_name.clone(),
            format_name: pass.format_name.clone(),
            expiration_date: pass.expiration_date,
            voided: pass.voided,
        }
    }
}

impl PassStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening pass store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let passes = keyspace.open_partition("passes", PartitionCreateOptions::default())?;
        let images = keyspace.open_partition("images", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            passes,
            images,
            write_lock: Mutex::new(()),
        })
    }

    /// Store a new pass; fails if the id is taken
    pub fn insert(&self, pass: &UnifiedPass) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.contains(&pass.id)? {
            return Err(StoreError::Duplicate(pass.id.clone()));
        }
        self.write(pass)
    }

    /// Store or replace a pass, images included
    pub fn upsert(&self, pass: &UnifiedPass) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(pass)
    }

    fn write(&self, pass: &UnifiedPass) -> Result<()> {
        let value = serde_json::to_vec(pass)?;

        let mut batch = self.keyspace.batch();
        batch.insert(&self.passes, encode_pass_key(&pass.id), value);
        for slot in ImageSlot::ALL {
            let key = encode_image_key(&pass.id, slot);
            match pass.images.get(slot) {
                Some(data) => batch.insert(&self.images, key, &data[..]),
                None => batch.remove(&self.images, key),
            }
        }
        batch.commit()?;

        debug!(id = %pass.id, "stored pass");
        Ok(())
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.passes.get(encode_pass_key(id))?.is_some())
    }

    /// Get a pass with its images
    pub fn get(&self, id: &str) -> Result<Option<UnifiedPass>> {
        let Some(value) = self.passes.get(encode_pass_key(id))? else {
            return Ok(None);
        };

        let mut pass: UnifiedPass = serde_json::from_slice(&value)?;
        pass.images = self.load_images(id)?;
        Ok(Some(pass))
    }

    fn load_images(&self, id: &str) -> Result<PassImages> {
        let mut images = PassImages::default();
        for slot in ImageSlot::ALL {
            let data = self
                .images
                .get(encode_image_key(id, slot))?
                .map(|slice| Bytes::copy_from_slice(&slice));
            images.set(slot, data);
        }
        Ok(images)
    }

    /// All stored passes in key order, without images
    pub fn list(&self) -> Result<Vec<PassSummary>> {
        let mut summaries = Vec::new();
        for item in self.passes.iter() {
            let (key, value) = item?;
            if decode_pass_key(&key).is_none() {
                continue;
            }
            let pass: UnifiedPass = serde_json::from_slice(&value)?;
            summaries.push(PassSummary::from(&pass));
        }
        Ok(summaries)
    }

    /// Remove a pass and its images. Returns whether the pass existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if !self.contains(id)? {
            return Ok(false);
        }

        let mut batch = self.keyspace.batch();
        batch.remove(&self.passes, encode_pass_key(id));
        for slot in ImageSlot::ALL {
            batch.remove(&self.images, encode_image_key(id, slot));
        }
        batch.commit()?;

        info!(id, "deleted pass");
        Ok(true)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut pass_count = 0;
        let mut image_count = 0;

        for item in self.passes.iter() {
            item?;
            pass_count += 1;
        }

        for item in self.images.iter() {
            item?;
            image_count += 1;
        }

        Ok(StoreStats {
            pass_count,
            image_count,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub pass_count: usize,
    pub image_count: usize,
}
