//! Reads a user record through a fixed view policy.
//!
//! The policy's attributes become the store-side projection, so attributes
//! outside the view never leave the table. The IAM role of each deployed
//! function carries the matching `dynamodb:Attributes` condition.

use common::attributes::item_to_json;
use common::config::{env_lookup, required};
use common::{DynamoStore, RecordKey, RecordStore, ViewError};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

const TABLE_NAME: &str = "TABLE_NAME";
pub const USER_KEY: &str = "userId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPolicy {
    pub name: &'static str,
    pub attributes: &'static [&'static str],
}

pub const WINS_VIEW: ViewPolicy = ViewPolicy {
    name: "wins",
    attributes: &["userId", "wins"],
};

pub const SCORE_VIEW: ViewPolicy = ViewPolicy {
    name: "score",
    attributes: &["userId", "topScore"],
};

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

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserViewRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn get_user_view(
    store: &dyn RecordStore,
    policy: &ViewPolicy,
    request: GetUserViewRequest,
) -> Result<Map<String, Value>, ViewError> {
    let user_id = match request.user_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(ViewError::InvalidParameters(format!("{} is required", USER_KEY)))
    };
    let key = RecordKey::partition(USER_KEY, &user_id);
    match store.get(&key, Some(policy.attributes)).await? {
        Some(item) => Ok(item_to_json(&item)),
        None => Err(ViewError::NotFound(key.to_string()))
    }
}

pub async fn function_handler(
    store: &dyn RecordStore,
    policy: &ViewPolicy,
    event: LambdaEvent<GetUserViewRequest>,
) -> Result<Value, Error> {
    info!("{} view request: {:?}", policy.name, event.payload);
    match get_user_view(store, policy, event.payload).await {
        Ok(view) => {
            info!("returning attributes {:?}", view.keys().collect::<Vec<_>>());
            Ok(Value::Object(view))
        }
        Err(e) => {
            error!("{} view failed: {}", policy.name, e);
            Err(e.into())
        }
    }
}

/// Starts the Lambda runtime for one view. Configuration is checked before
/// the first invocation is accepted.
pub async fn run_view(policy: &'static ViewPolicy) -> Result<(), Error> {
    let config = Config::from_env().map_err(|e| {
        error!("startup failed: {}", e);
        e
    })?;
    let sdk_config = common::aws::load_sdk_config().await;
    let store = DynamoStore::new(common::aws::dynamodb_client(&sdk_config), config.table_name);
    run(service_fn(|event| function_handler(&store, policy, event))).await
}
