use anyhow::Result;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ConfirmToken, ConfirmationStore, DEFAULT_TTL_SECS, PendingInstall, StoredRecord};

/// In-process store. Records vanish with the process.
pub struct MemoryConfirmationStore {
    ttl: Duration,
    records: Mutex<HashMap<ConfirmToken, StoredRecord>>,
}

impl Default for MemoryConfirmationStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl MemoryConfirmationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<ConfirmToken, StoredRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfirmationStore for MemoryConfirmationStore {
    fn save(&self, token: &ConfirmToken, pending: &PendingInstall) -> Result<()> {
        let record = StoredRecord::new(pending.clone(), self.ttl)?;
        let mut records = self.records();
        records.retain(|_, record| !record.is_expired());
        records.insert(token.clone(), record);
        Ok(())
    }

    fn load(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>> {
        let mut records = self.records();
        match records.get(token) {
            Some(record) if record.is_expired() => {
                records.remove(token);
                Ok(None)
            }
            Some(record) => Ok(Some(record.pending.clone())),
            None => Ok(None),
        }
    }

    fn take(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>> {
        Ok(self
            .records()
            .remove(token)
            .filter(|record| !record.is_expired())
            .map(|record| record.pending))
    }
}
