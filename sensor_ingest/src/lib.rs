use async_trait::async_trait;
use aws_sdk_timestreamwrite as tsw;
use aws_sdk_timestreamwrite::error::DisplayErrorContext;
use aws_sdk_timestreamwrite::types::{Dimension, MeasureValueType, Record, TimeUnit};
use common::config::{env_lookup, optional, required};
use common::ViewError;
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{debug, error, info};

const DATABASE_NAME: &str = "DATABASE_NAME";
const TABLE_NAME: &str = "TABLE_NAME";
const DIMENSION_NAME: &str = "DIMENSION_NAME";
const INTERVAL_MS: &str = "INTERVAL_MS";

/// Timestream accepts at most this many records per WriteRecords call.
pub const MAX_BATCH: usize = 100;

/// One day. A full batch then spans at most 100 days past its base time.
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_name: String,
    pub table_name: String,
    pub dimension_name: String,
    pub interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ViewError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_ms = match u64::from_str(&optional(&lookup, INTERVAL_MS, "1000")) {
            Ok(i) if i > 0 && i <= MAX_INTERVAL_MS => i,
            _ => return Err(ViewError::Configuration(INTERVAL_MS.to_string()))
        };
        Ok(Self {
            database_name: required(&lookup, DATABASE_NAME)?,
            table_name: required(&lookup, TABLE_NAME)?,
            dimension_name: optional(&lookup, DIMENSION_NAME, "deviceId"),
            interval_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub value: Number,
}

/// Direct invocation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub device_id: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status_code: u16,
    pub records_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueType {
    Bigint,
    Double,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub dimension_name: String,
    pub dimension_value: String,
    pub measure_name: String,
    pub measure_value: String,
    pub value_type: ValueType,
    /// Epoch milliseconds, as text.
    pub time: String,
}

#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(&self, database: &str, table: &str, points: &[DataPoint]) -> Result<(), ViewError>;
}

pub struct TimestreamWriter {
    client: tsw::Client,
}

impl TimestreamWriter {
    pub fn new(client: tsw::Client) -> Self {
        Self { client }
    }
}

fn to_record(point: &DataPoint) -> Result<Record, ViewError> {
    let dimension = Dimension::builder()
        .name(point.dimension_name.to_owned())
        .value(point.dimension_value.to_owned())
        .build()
        .map_err(|e| ViewError::InvalidParameters(e.to_string()))?;
    Ok(Record::builder()
        .dimensions(dimension)
        .measure_name(point.measure_name.to_owned())
        .measure_value(point.measure_value.to_owned())
        .measure_value_type(match point.value_type {
            ValueType::Bigint => MeasureValueType::Bigint,
            ValueType::Double => MeasureValueType::Double
        })
        .time(point.time.to_owned())
        .time_unit(TimeUnit::Milliseconds)
        .build())
}

#[async_trait]
impl BatchWriter for TimestreamWriter {
    async fn write_batch(&self, database: &str, table: &str, points: &[DataPoint]) -> Result<(), ViewError> {
        let records = points.iter().map(to_record).collect::<Result<Vec<_>, _>>()?;
        self.client.write_records()
            .database_name(database)
            .table_name(table)
            .set_records(Some(records))
            .send()
            .await
            .map_err(|e| ViewError::Upstream(format!("write_records {}.{}: {}", database, table, DisplayErrorContext(&e))))?;
        Ok(())
    }
}

pub fn validate(request: &IngestRequest) -> Result<(), ViewError> {
    if request.device_id.trim().is_empty() {
        return Err(ViewError::InvalidParameters("deviceId is required".into()));
    }
    if request.measures.is_empty() || request.measures.len() > MAX_BATCH {
        return Err(ViewError::InvalidParameters(
            format!("expected 1 to {} measures, got {}", MAX_BATCH, request.measures.len())
        ));
    }
    if request.measures.iter().any(|m| m.name.trim().is_empty()) {
        return Err(ViewError::InvalidParameters("measure names must not be blank".into()));
    }
    Ok(())
}

fn offset_time(base_millis: u64, index: usize, interval_ms: u64) -> Result<u64, ViewError> {
    (index as u64)
        .checked_mul(interval_ms)
        .and_then(|offset| base_millis.checked_add(offset))
        .ok_or_else(|| ViewError::InvalidParameters(
            format!("timestamp for measure {} overflows (base {}, interval {})", index, base_millis, interval_ms)
        ))
}

/// Stamps the i-th measure at `base_millis + i * interval`.
pub fn build_points(config: &Config, request: &IngestRequest, base_millis: u64) -> Result<Vec<DataPoint>, ViewError> {
    request.measures
        .iter()
        .enumerate()
        .map(|(i, m)| Ok(DataPoint {
            dimension_name: config.dimension_name.to_owned(),
            dimension_value: request.device_id.to_owned(),
            measure_name: m.name.to_owned(),
            measure_value: m.value.to_string(),
            value_type: if m.value.is_f64() { ValueType::Double } else { ValueType::Bigint },
            time: offset_time(base_millis, i, config.interval_ms)?.to_string(),
        }))
        .collect()
}

pub async fn ingest(
    writer: &dyn BatchWriter,
    config: &Config,
    request: &IngestRequest,
    base_millis: u64,
) -> Result<IngestResponse, ViewError> {
    validate(request)?;
    let points = build_points(config, request, base_millis)?;
    debug!("writing points {:?}", points);
    writer.write_batch(&config.database_name, &config.table_name, &points).await?;
    Ok(IngestResponse {
        status_code: 200,
        records_written: points.len(),
    })
}

pub async fn function_handler(
    writer: &dyn BatchWriter,
    config: &Config,
    event: LambdaEvent<IngestRequest>,
) -> Result<IngestResponse, Error> {
    let base_millis = match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as u64,
        Err(_) => 0
    };
    match ingest(writer, config, &event.payload, base_millis).await {
        Ok(response) => {
            info!(
                "wrote {} records for {} to {}.{}",
                response.records_written, event.payload.device_id, config.database_name, config.table_name
            );
            Ok(response)
        }
        Err(e) => {
            error!("ingest for {} failed: {}", event.payload.device_id, e);
            Err(e.into())
        }
    }
}
