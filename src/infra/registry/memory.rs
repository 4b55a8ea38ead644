//! Process-local registry, used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{AppError, ProductRegistry, Pubkey, RegistryEntry};

#[derive(Default)]
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRegistry for InMemoryRegistry {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn record(&self, name: &str, address: &Pubkey) -> Result<RegistryEntry, AppError> {
        let entry = RegistryEntry {
            name: name.to_string(),
            address: *address,
            recorded_at: Utc::now(),
        };
        let previous = self
            .entries
            .write()
            .await
            .insert(name.to_string(), entry.clone());
        if previous.is_some() {
            debug!("Replaced existing registry entry");
        }
        Ok(entry)
    }

    async fn lookup(&self, name: &str) -> Result<Option<RegistryEntry>, AppError> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<RegistryEntry>, AppError> {
        let mut entries: Vec<RegistryEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_lookup() {
        let registry = InMemoryRegistry::new();
        let address = Pubkey::new_from_array([1u8; 32]);

        let entry = registry.record("Widget", &address).await.unwrap();
        assert_eq!(entry.address, address);

        let found = registry.lookup("Widget").await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert!(registry.lookup("Gadget").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_overwrites_name() {
        let registry = InMemoryRegistry::new();
        registry
            .record("Widget", &Pubkey::new_from_array([1u8; 32]))
            .await
            .unwrap();
        registry
            .record("Widget", &Pubkey::new_from_array([2u8; 32]))
            .await
            .unwrap();

        let entries = registry.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].address, Pubkey::new_from_array([2u8; 32]));
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let registry = InMemoryRegistry::new();
        registry.record("First", &Pubkey::new_from_array([1u8; 32])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        registry.record("Second", &Pubkey::new_from_array([2u8; 32])).await.unwrap();

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }
}
