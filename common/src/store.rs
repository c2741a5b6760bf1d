//! The record store seam and its DynamoDB implementation.

use crate::error::{Result, ViewError};
use async_trait::async_trait;
use aws_sdk_dynamodb as ddb;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use tracing::{debug, error};

pub type Item = HashMap<String, AttributeValue>;

/// Partition key plus optional sort key, both string typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub partition: (String, String),
    pub sort: Option<(String, String)>,
}

impl RecordKey {
    pub fn partition(name: &str, value: &str) -> Self {
        Self {
            partition: (name.to_string(), value.to_string()),
            sort: None,
        }
    }

    pub fn with_sort(mut self, name: &str, value: &str) -> Self {
        self.sort = Some((name.to_string(), value.to_string()));
        self
    }

    pub fn to_item(&self) -> Item {
        let mut key = HashMap::from([
            (self.partition.0.clone(), AttributeValue::S(self.partition.1.clone()))
        ]);
        if let Some((name, value)) = &self.sort {
            key.insert(name.clone(), AttributeValue::S(value.clone()));
        }
        key
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.partition.0, self.partition.1)?;
        if let Some((name, value)) = &self.sort {
            write!(f, ", {}={}", name, value)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches one record. With a projection, only those attributes leave the store.
    async fn get(&self, key: &RecordKey, projection: Option<&[&str]>) -> Result<Option<Item>>;

    /// Inserts a record, failing with `Conflict` if `key_attribute` is already taken.
    async fn put_new(&self, key_attribute: &str, item: Item) -> Result<()>;
}

/// Builds a `ProjectionExpression` with `#aN` placeholders, so reserved
/// words such as `name` can be projected.
pub fn projection_expression(attributes: &[&str]) -> (String, HashMap<String, String>) {
    let mut names = HashMap::with_capacity(attributes.len());
    let placeholders: Vec<String> = attributes
        .iter()
        .enumerate()
        .map(|(i, attr)| {
            let placeholder = format!("#a{}", i);
            names.insert(placeholder.clone(), attr.to_string());
            placeholder
        })
        .collect();
    (placeholders.join(", "), names)
}

pub struct DynamoStore {
    client: ddb::Client,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: ddb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get(&self, key: &RecordKey, projection: Option<&[&str]>) -> Result<Option<Item>> {
        let mut request = self.client.get_item()
            .table_name(self.table_name.to_owned())
            .set_key(Some(key.to_item()));
        if let Some(attributes) = projection {
            let (expression, names) = projection_expression(attributes);
            debug!("projecting {} for {}", expression, key);
            request = request
                .projection_expression(expression)
                .set_expression_attribute_names(Some(names));
        }
        let output = request.send().await.map_err(|e| {
            error!("get_item on {} failed: {}", self.table_name, DisplayErrorContext(&e));
            ViewError::Upstream(format!("get_item: {}", DisplayErrorContext(&e)))
        })?;
        // DynamoDB returns an empty map for a projection that matches no attribute.
        Ok(output.item)
    }

    async fn put_new(&self, key_attribute: &str, item: Item) -> Result<()> {
        let key = match item.get(key_attribute) {
            Some(AttributeValue::S(k)) => k.to_owned(),
            _ => return Err(ViewError::InvalidParameters(format!("{} must be a string", key_attribute)))
        };
        let result = self.client.put_item()
            .table_name(self.table_name.to_owned())
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#k)")
            .expression_attribute_names("#k", key_attribute)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    Err(ViewError::Conflict(key))
                } else {
                    error!("put_item on {} failed: {}", self.table_name, DisplayErrorContext(&service_error));
                    Err(ViewError::Upstream(format!("put_item: {}", DisplayErrorContext(&service_error))))
                }
            }
        }
    }
}
