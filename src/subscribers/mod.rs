// Subscriber registry and admin commands
pub mod commands;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::ScanError;
use crate::Result;

pub use commands::{
    AdminPolicy, Command, CommandError, CommandHandler, CommandOutcome, CommandRejection,
};

/// Chat-channel address of a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Thread-safe map of recipients to display names
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    data: Arc<RwLock<HashMap<RecipientId, String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with initial subscribers (typically the admins)
    pub fn with_recipients<I>(recipients: I) -> Self
    where
        I: IntoIterator<Item = (RecipientId, String)>,
    {
        Self {
            data: Arc::new(RwLock::new(recipients.into_iter().collect())),
        }
    }

    /// Add or rename a recipient; returns true if it was not present
    pub fn add_recipient(&self, id: RecipientId, display_name: impl Into<String>) -> Result<bool> {
        let mut data = self.data.write().map_err(|e| ScanError::Registry(e.to_string()))?;
        Ok(data.insert(id, display_name.into()).is_none())
    }

    /// Remove a recipient, returning its display name if it was present
    pub fn remove_recipient(&self, id: &RecipientId) -> Result<Option<String>> {
        let mut data = self.data.write().map_err(|e| ScanError::Registry(e.to_string()))?;
        Ok(data.remove(id))
    }

    /// All recipients, sorted for stable fan-out order
    pub fn list_recipients(&self) -> Result<Vec<RecipientId>> {
        let data = self.data.read().map_err(|e| ScanError::Registry(e.to_string()))?;
        let mut recipients: Vec<RecipientId> = data.keys().cloned().collect();
        recipients.sort();
        Ok(recipients)
    }

    pub fn display_name(&self, id: &RecipientId) -> Result<Option<String>> {
        let data = self.data.read().map_err(|e| ScanError::Registry(e.to_string()))?;
        Ok(data.get(id).cloned())
    }

    pub fn contains(&self, id: &RecipientId) -> Result<bool> {
        let data = self.data.read().map_err(|e| ScanError::Registry(e.to_string()))?;
        Ok(data.contains_key(id))
    }

    pub fn len(&self) -> Result<usize> {
        let data = self.data.read().map_err(|e| ScanError::Registry(e.to_string()))?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let registry = SubscriberRegistry::new();
        assert!(registry.add_recipient("200".into(), "Bob").unwrap());
        assert!(registry.add_recipient("100".into(), "Aryan").unwrap());
        assert!(!registry.add_recipient("100".into(), "Aryan K").unwrap());

        assert_eq!(
            registry.list_recipients().unwrap(),
            vec![RecipientId::from("100"), RecipientId::from("200")]
        );
        assert_eq!(
            registry.display_name(&"100".into()).unwrap().as_deref(),
            Some("Aryan K")
        );
    }

    #[test]
    fn test_remove() {
        let registry =
            SubscriberRegistry::with_recipients([(RecipientId::from("1"), "Admin".to_string())]);

        assert_eq!(
            registry.remove_recipient(&"1".into()).unwrap().as_deref(),
            Some("Admin")
        );
        assert!(registry.remove_recipient(&"1".into()).unwrap().is_none());
        assert_eq!(registry.len().unwrap(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        use std::thread;

        let registry = SubscriberRegistry::new();
        let clone = registry.clone();

        let handle = thread::spawn(move || {
            for i in 0..50 {
                clone.add_recipient(RecipientId::from(i as i64), "user").unwrap();
            }
        });
        for i in 50..100 {
            registry.add_recipient(RecipientId::from(i as i64), "user").unwrap();
        }
        handle.join().unwrap();

        assert_eq!(registry.len().unwrap(), 100);
        assert!(registry.contains(&RecipientId::from(42)).unwrap());
    }

    #[test]
    fn test_recipient_id_trims() {
        assert_eq!(RecipientId::new(" 123 ").as_str(), "123");
        assert_eq!(RecipientId::from(-100123_i64).to_string(), "-100123");
    }
}
