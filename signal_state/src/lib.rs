//! Classifies photos of a signal tower (stack light) dropped into a bucket
//! and records the equipment state they show.
//!
//! The state comes from the brightest histogram bin of each colour channel,
//! i.e. how many pixels saturate red, green and blue.

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, FixedOffset, Utc};
use common::config::{env_lookup, required};
use common::{Item, ObjectSource, RecordStore, ViewError};
use image::RgbImage;
use lambda_runtime::{Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

const TABLE_NAME: &str = "TABLE_NAME";
pub const PARTITION_KEY: &str = "equipment-number";
pub const SORT_KEY: &str = "file-name";
const STATE: &str = "state";

/// Non-green readings whose leading channel beats the runner-up by more
/// than this many saturated pixels are abnormal.
pub const ABNORMAL_MARGIN: u64 = 5000;

const JST_OFFSET_SECS: i32 = 9 * 3600;
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ViewError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            table_name: required(&lookup, TABLE_NAME)?,
        })
    }
}

/// S3 event notification, reduced to the fields read here.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalState {
    Good,
    Stop,
    Abnormality,
}

impl SignalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalState::Good => "Good",
            SignalState::Stop => "Stop",
            SignalState::Abnormality => "Abnormality"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelCounts {
    pub red: u64,
    pub green: u64,
    pub blue: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub taken_at: String,
    pub file_name: String,
    pub state: SignalState,
}

impl Observation {
    fn to_item(&self) -> Item {
        HashMap::from([
            (PARTITION_KEY.to_string(), AttributeValue::S(self.taken_at.to_owned())),
            (SORT_KEY.to_string(), AttributeValue::S(self.file_name.to_owned())),
            (STATE.to_string(), AttributeValue::S(self.state.as_str().to_string()))
        ])
    }
}

/// Last histogram bin per channel: pixels at full intensity.
pub fn last_bin_counts(image: &RgbImage) -> ChannelCounts {
    image.pixels().fold(ChannelCounts::default(), |mut counts, pixel| {
        let [r, g, b] = pixel.0;
        counts.red += u64::from(r == u8::MAX);
        counts.green += u64::from(g == u8::MAX);
        counts.blue += u64::from(b == u8::MAX);
        counts
    })
}

/// Green leading means running. Otherwise a clear lead is an alarm and a
/// close race is a stopped (unlit or mixed) tower. Ties rank red, green, blue.
pub fn pred_state(counts: &ChannelCounts) -> SignalState {
    let mut ranked = [
        (Channel::Red, counts.red),
        (Channel::Green, counts.green),
        (Channel::Blue, counts.blue)
    ];
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    match ranked {
        [(Channel::Green, _), ..] => SignalState::Good,
        [(_, first), (_, second), _] if first - second > ABNORMAL_MARGIN => SignalState::Abnormality,
        _ => SignalState::Stop
    }
}

pub fn classify(bytes: &[u8]) -> Result<SignalState, ViewError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ViewError::Malformed(format!("not a readable image: {}", e)))?;
    let counts = last_bin_counts(&image.to_rgb8());
    debug!("saturated pixel counts {:?}", counts);
    Ok(pred_state(&counts))
}

/// Event keys arrive form-encoded: `+` for spaces, `%XX` for the rest.
pub fn decode_key(raw: &str) -> Result<String, ViewError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| ViewError::Malformed(format!("object key {}: {}", raw, e)))
}

pub fn jst_now() -> Result<DateTime<FixedOffset>, ViewError> {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS)
        .ok_or_else(|| ViewError::Configuration("JST offset".into()))?;
    Ok(Utc::now().with_timezone(&jst))
}

async fn observe(
    source: &dyn ObjectSource,
    record: &S3EventRecord,
    taken_at: &str,
) -> Result<Observation, ViewError> {
    let key = decode_key(&record.s3.object.key)?;
    let bytes = source.fetch(&record.s3.bucket.name, &key).await?;
    Ok(Observation {
        taken_at: taken_at.to_string(),
        file_name: key.replace(".jpg", ""),
        state: classify(&bytes)?,
    })
}

/// Classifies every uploaded object and stores one state row per photo,
/// all stamped with the invocation time. A row that already exists is a
/// redelivered notification and is skipped.
pub async fn record_states(
    source: &dyn ObjectSource,
    store: &dyn RecordStore,
    event: &S3Event,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Observation>, ViewError> {
    if event.records.is_empty() {
        return Err(ViewError::Malformed("event carries no Records".into()));
    }
    let taken_at = now.format(TIMESTAMP_FORMAT).to_string();
    let mut recorded = Vec::with_capacity(event.records.len());
    for record in &event.records {
        let observation = observe(source, record, &taken_at).await?;
        match store.put_new(PARTITION_KEY, observation.to_item()).await {
            Ok(()) => recorded.push(observation),
            Err(ViewError::Conflict(key)) => warn!("state for {} already recorded", key),
            Err(e) => return Err(e)
        }
    }
    Ok(recorded)
}

pub async fn function_handler(
    source: &dyn ObjectSource,
    store: &dyn RecordStore,
    event: LambdaEvent<S3Event>,
) -> Result<Value, Error> {
    debug!("s3 event: {:?}", event.payload);
    let result = match jst_now() {
        Ok(now) => record_states(source, store, &event.payload, now).await,
        Err(e) => Err(e)
    };
    match result {
        Ok(recorded) => {
            for observation in &recorded {
                info!("{} at {}: {}", observation.file_name, observation.taken_at, observation.state.as_str());
            }
            Ok(serde_json::json!({ "recorded": recorded.len() }))
        }
        Err(e) => {
            error!("state recording failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn counts(red: u64, green: u64, blue: u64) -> ChannelCounts {
        ChannelCounts { red, green, blue }
    }

    #[test]
    fn green_leading_is_good() {
        assert_eq!(pred_state(&counts(10, 20_000, 5)), SignalState::Good);
        assert_eq!(pred_state(&counts(0, 1, 0)), SignalState::Good);
    }

    #[test]
    fn clear_non_green_lead_is_abnormal() {
        assert_eq!(pred_state(&counts(12_000, 1_000, 0)), SignalState::Abnormality);
        assert_eq!(pred_state(&counts(0, 100, 5_101)), SignalState::Abnormality);
    }

    #[test]
    fn margin_is_exclusive() {
        assert_eq!(pred_state(&counts(6_000, 1_000, 0)), SignalState::Stop);
        assert_eq!(pred_state(&counts(6_001, 1_000, 0)), SignalState::Abnormality);
    }

    #[test]
    fn ties_rank_red_first() {
        // all channels saturated, as in a white or overexposed photo
        assert_eq!(pred_state(&counts(9_000, 9_000, 9_000)), SignalState::Stop);
        assert_eq!(pred_state(&counts(0, 0, 0)), SignalState::Stop);
        assert_eq!(pred_state(&counts(100, 9_000, 9_000)), SignalState::Good);
    }

    #[test]
    fn only_full_intensity_pixels_count() {
        let image = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([254, 255, 0]),
            2 => Rgb([255, 255, 255]),
            _ => Rgb([10, 10, 10])
        });
        assert_eq!(last_bin_counts(&image), counts(2, 2, 1));
    }

    #[test]
    fn classify_decodes_png() {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([0, 255, 40])))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        assert_eq!(classify(bytes.get_ref()).unwrap(), SignalState::Good);
        assert!(matches!(classify(b"not an image"), Err(ViewError::Malformed(_))));
    }

    #[test]
    fn keys_are_form_decoded() {
        assert_eq!(decode_key("line+a%2Fshot+01.jpg").unwrap(), "line a/shot 01.jpg");
        assert_eq!(decode_key("%E8%A8%AD%E5%82%99.jpg").unwrap(), "設備.jpg");
        assert!(matches!(decode_key("%FF.jpg"), Err(ViewError::Malformed(_))));
    }

    #[test]
    fn event_parses_notification_records() {
        let event: S3Event = serde_json::from_value(serde_json::json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "s3": {"bucket": {"name": "towers"}, "object": {"key": "line-a.jpg", "size": 1024}}
            }]
        })).unwrap();
        assert_eq!(event.records[0].s3.bucket.name, "towers");
        assert_eq!(event.records[0].s3.object.key, "line-a.jpg");
    }

    #[test]
    fn observation_item_uses_table_keys() {
        let item = Observation {
            taken_at: "20240401093000".into(),
            file_name: "line-a".into(),
            state: SignalState::Abnormality,
        }.to_item();
        assert_eq!(item.get(PARTITION_KEY), Some(&AttributeValue::S("20240401093000".into())));
        assert_eq!(item.get(SORT_KEY), Some(&AttributeValue::S("line-a".into())));
        assert_eq!(item.get(STATE), Some(&AttributeValue::S("Abnormality".into())));
    }

    #[test]
    fn table_name_is_required() {
        assert!(matches!(Config::from_lookup(|_| None), Err(ViewError::Configuration(name)) if name == TABLE_NAME));
        assert_eq!(Config::from_lookup(|_| Some("SignalStates".into())).unwrap().table_name, "SignalStates");
    }
}
