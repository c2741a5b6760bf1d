use crate::error::{Result, ViewError};
use crate::store::{Item, RecordKey, RecordStore};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory store keyed on the partition (and sort) value, applying
/// projections the way DynamoDB does.
#[derive(Default)]
pub struct MemoryStore {
    key_attributes: Vec<String>,
    items: Mutex<HashMap<Vec<String>, Item>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(partition_key: &str) -> Self {
        Self {
            key_attributes: vec![partition_key.to_string()],
            ..Default::default()
        }
    }

    pub fn with_sort_key(mut self, sort_key: &str) -> Self {
        self.key_attributes.push(sort_key.to_string());
        self
    }

    /// Seeds a record without counting it as a call.
    pub fn insert(&self, item: Item) {
        if let Some(key) = self.key_of(&item) {
            self.items.lock().unwrap().insert(key, item);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_of(&self, item: &Item) -> Option<Vec<String>> {
        self.key_attributes
            .iter()
            .map(|name| match item.get(name) {
                Some(AttributeValue::S(v)) => Some(v.clone()),
                _ => None
            })
            .collect()
    }

    fn lookup_key(&self, key: &RecordKey) -> Vec<String> {
        let mut parts = vec![key.partition.1.clone()];
        if let Some((_, sort)) = &key.sort {
            parts.push(sort.clone());
        }
        parts
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &RecordKey, projection: Option<&[&str]>) -> Result<Option<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = self.items.lock().unwrap();
        Ok(items.get(&self.lookup_key(key)).map(|item| match projection {
            Some(attributes) => item
                .iter()
                .filter(|(name, _)| attributes.contains(&name.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => item.clone()
        }))
    }

    async fn put_new(&self, key_attribute: &str, item: Item) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = self.key_of(&item)
            .ok_or_else(|| ViewError::InvalidParameters(format!("{} must be a string", key_attribute)))?;
        let mut items = self.items.lock().unwrap();
        if items.contains_key(&key) {
            return Err(ViewError::Conflict(key.join("/")));
        }
        items.insert(key, item);
        Ok(())
    }
}
