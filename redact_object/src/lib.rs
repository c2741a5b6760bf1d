//! S3 Object Lambda transform that masks one field of every record in a
//! JSON document before handing the document back to the caller.

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use common::config::{env_lookup, optional, required};
pub use common::ObjectSource;
use common::{S3Objects, ViewError};
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

const BUCKET_NAME: &str = "BUCKET_NAME";
const OBJECT_KEY: &str = "OBJECT_KEY";
const MASK_FIELD: &str = "MASK_FIELD";
const MASK_CHAR: &str = "MASK_CHAR";
const CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bucket_name: String,
    pub object_key: String,
    pub mask_field: String,
    pub mask_char: char,
}

impl Config {
    pub fn from_env() -> Result<Self, ViewError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mask = optional(&lookup, MASK_CHAR, "*");
        let mut chars = mask.chars();
        let mask_char = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ViewError::Configuration(MASK_CHAR.to_string()))
        };
        Ok(Self {
            bucket_name: required(&lookup, BUCKET_NAME)?,
            object_key: required(&lookup, OBJECT_KEY)?,
            mask_field: optional(&lookup, MASK_FIELD, "privateNumber"),
            mask_char,
        })
    }
}

/// The parts of the Object Lambda invocation payload this function reads.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLambdaEvent {
    #[serde(default)]
    pub x_amz_request_id: Option<String>,
    #[serde(default)]
    pub get_object_context: Option<GetObjectContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetObjectContext {
    #[serde(default)]
    pub input_s3_url: Option<String>,
    pub output_route: String,
    pub output_token: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactOutcome {
    pub records: usize,
    pub masked: usize,
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn write_response(
        &self,
        route: &str,
        token: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ViewError>;
}

/// S3 access for the transform: object reads plus the Object Lambda response.
pub struct S3Gateway {
    objects: S3Objects,
    client: s3::Client,
}

impl S3Gateway {
    pub fn new(client: s3::Client) -> Self {
        Self { objects: S3Objects::new(client.clone()), client }
    }
}

#[async_trait]
impl ObjectSource for S3Gateway {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ViewError> {
        self.objects.fetch(bucket, key).await
    }
}

#[async_trait]
impl ResponseSink for S3Gateway {
    async fn write_response(
        &self,
        route: &str,
        token: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ViewError> {
        self.client.write_get_object_response()
            .request_route(route)
            .request_token(token)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ViewError::Upstream(format!("write_get_object_response: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}

/// Same number of characters as `value`, all of them `mask`.
pub fn mask_value(value: &str, mask: char) -> String {
    std::iter::repeat(mask).take(value.chars().count()).collect()
}

/// Masks `field` in every record of a `{ id: { field: ... } }` document.
/// Non-string values are masked by the length of their JSON text; nulls
/// and records without the field are left alone.
pub fn mask_records(document: Value, field: &str, mask: char) -> Result<Value, ViewError> {
    let Value::Object(mut records) = document else {
        return Err(ViewError::Malformed("expected a JSON object of records".into()));
    };
    for record in records.values_mut() {
        if let Value::Object(fields) = record {
            match fields.get_mut(field) {
                Some(Value::Null) | None => {}
                Some(Value::String(s)) => *s = mask_value(s, mask),
                Some(other) => *other = Value::String(mask_value(&other.to_string(), mask))
            }
        }
    }
    Ok(Value::Object(records))
}

/// Counts object members (records) and those carrying a non-null `field`.
fn count_sensitive(document: &Value, field: &str) -> (usize, usize) {
    match document {
        Value::Object(members) => members.values()
            .filter_map(Value::as_object)
            .fold((0, 0), |(records, masked), record| match record.get(field) {
                Some(v) if !v.is_null() => (records + 1, masked + 1),
                _ => (records + 1, masked)
            }),
        _ => (0, 0)
    }
}

pub async fn redact(
    source: &dyn ObjectSource,
    sink: &dyn ResponseSink,
    config: &Config,
    event: ObjectLambdaEvent,
) -> Result<RedactOutcome, ViewError> {
    let context = event.get_object_context
        .ok_or_else(|| ViewError::Malformed("missing getObjectContext".into()))?;
    let raw = source.fetch(&config.bucket_name, &config.object_key).await?;
    let document: Value = serde_json::from_slice(&raw)?;
    let (records, masked) = count_sensitive(&document, &config.mask_field);
    let transformed = mask_records(document, &config.mask_field, config.mask_char)?;
    sink.write_response(
        &context.output_route,
        &context.output_token,
        serde_json::to_vec(&transformed)?,
        CONTENT_TYPE,
    ).await?;
    Ok(RedactOutcome { records, masked })
}

pub async fn function_handler(
    gateway: &S3Gateway,
    config: &Config,
    event: LambdaEvent<ObjectLambdaEvent>,
) -> Result<Value, Error> {
    debug!("object lambda event: {:?}", event.payload);
    let request_id = event.payload.x_amz_request_id.clone().unwrap_or_default();
    match redact(gateway, gateway, config, event.payload).await {
        Ok(outcome) => {
            info!(
                "request {}: masked {} of {} records in {}/{}",
                request_id, outcome.masked, outcome.records, config.bucket_name, config.object_key
            );
            Ok(serde_json::json!({ "statusCode": 200 }))
        }
        Err(e) => {
            error!("request {}: redaction failed: {}", request_id, e);
            Err(e.into())
        }
    }
}
