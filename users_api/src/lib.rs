use aws_sdk_dynamodb::types::AttributeValue;
use common::config::{env_lookup, required};
use common::{Item, RecordKey, RecordStore, ViewError};
use lambda_http::http::Method;
use lambda_http::{Body, Error, Request, RequestExt, Response};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, error, info};

const TABLE_NAME: &str = "TABLE_NAME";
pub const USER_KEY: &str = "userId";
const SUMMARY_ATTRIBUTES: [&str; 2] = ["name", "age"];

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

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_id: String,
    pub name: String,
    pub age: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0\d{10,12}$").expect("phone number pattern"))
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ViewError> {
        if self.user_id.chars().count() != 16 {
            return Err(ViewError::InvalidParameters("userId must be exactly 16 characters".into()));
        }
        let name_len = self.name.chars().count();
        if !(1..=16).contains(&name_len) {
            return Err(ViewError::InvalidParameters("name must be 1 to 16 characters".into()));
        }
        if !(15.0..=99.0).contains(&self.age) {
            return Err(ViewError::InvalidParameters("age must be between 15 and 99".into()));
        }
        if let Some(phone) = &self.phone_number {
            if !phone_pattern().is_match(phone) {
                return Err(ViewError::InvalidParameters("phoneNumber has an invalid format".into()));
            }
        }
        Ok(())
    }

    fn into_item(self) -> Item {
        let mut item = HashMap::from([
            (USER_KEY.to_string(), AttributeValue::S(self.user_id)),
            ("name".to_string(), AttributeValue::S(self.name)),
            ("age".to_string(), AttributeValue::N(self.age.to_string()))
        ]);
        if let Some(phone) = self.phone_number {
            item.insert("phoneNumber".to_string(), AttributeValue::S(phone));
        }
        item
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub user_id: String,
}

/// Public summary of a user. Both fields render as strings.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub age: String,
}

pub async fn create_user(store: &dyn RecordStore, request: CreateUserRequest) -> Result<CreateUserResponse, ViewError> {
    request.validate()?;
    let user_id = request.user_id.clone();
    store.put_new(USER_KEY, request.into_item()).await?;
    info!("created user {}", user_id);
    Ok(CreateUserResponse { user_id })
}

fn text_of(item: &Item, name: &str) -> String {
    match item.get(name) {
        Some(AttributeValue::S(s)) | Some(AttributeValue::N(s)) => s.to_owned(),
        _ => String::new()
    }
}

pub async fn get_user(store: &dyn RecordStore, user_id: &str) -> Result<UserSummary, ViewError> {
    if user_id.trim().is_empty() {
        return Err(ViewError::InvalidParameters(format!("{} is required", USER_KEY)));
    }
    let key = RecordKey::partition(USER_KEY, user_id);
    match store.get(&key, Some(&SUMMARY_ATTRIBUTES[..])).await? {
        Some(item) => Ok(UserSummary {
            name: text_of(&item, "name"),
            age: text_of(&item, "age"),
        }),
        None => Err(ViewError::NotFound(key.to_string()))
    }
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

fn error_response(e: &ViewError) -> Result<Response<Body>, Error> {
    if e.status_code() >= 500 {
        error!("request failed: {}", e);
    } else {
        info!("request rejected: {}", e);
    }
    json_response(e.status_code(), &json!({ "message": e.to_string() }))
}

async fn handle_create(store: &dyn RecordStore, event: &Request) -> Result<Response<Body>, Error> {
    let body: &[u8] = event.body().as_ref();
    if body.is_empty() {
        return error_response(&ViewError::InvalidParameters("expected a request body".into()));
    }
    let request: CreateUserRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return error_response(&ViewError::InvalidParameters(e.to_string()))
    };
    match create_user(store, request).await {
        Ok(created) => json_response(201, &created),
        Err(e) => error_response(&e)
    }
}

/// Routes on the trailing path segments so stage prefixes are tolerated.
pub async fn function_handler(store: &dyn RecordStore, event: Request) -> Result<Response<Body>, Error> {
    debug!("request: {:?}", event);
    let path = event.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match (event.method(), segments.as_slice()) {
        (&Method::POST, [.., "users"]) => handle_create(store, &event).await,
        (&Method::GET, [.., "users", id]) => {
            let user_id = event.path_parameters_ref()
                .and_then(|params| params.first(USER_KEY))
                .unwrap_or(*id)
                .to_string();
            match get_user(store, &user_id).await {
                Ok(summary) => json_response(200, &summary),
                Err(e) => error_response(&e)
            }
        }
        _ => json_response(404, &json!({ "message": "not found" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MemoryStore;

    fn valid() -> CreateUserRequest {
        CreateUserRequest {
            user_id: "abcdefgh12345678".into(),
            name: "Taro".into(),
            age: 30.0,
            phone_number: Some("09012345678".into()),
        }
    }

    fn rejected(request: CreateUserRequest) -> bool {
        matches!(request.validate(), Err(ViewError::InvalidParameters(_)))
    }

    #[test]
    fn validation_accepts_well_formed_user() {
        assert!(valid().validate().is_ok());
        assert!(CreateUserRequest { phone_number: None, ..valid() }.validate().is_ok());
    }

    #[test]
    fn validation_enforces_lengths_and_ranges() {
        assert!(rejected(CreateUserRequest { user_id: "short".into(), ..valid() }));
        assert!(rejected(CreateUserRequest { name: String::new(), ..valid() }));
        assert!(rejected(CreateUserRequest { name: "a".repeat(17), ..valid() }));
        assert!(rejected(CreateUserRequest { age: 14.0, ..valid() }));
        assert!(rejected(CreateUserRequest { age: 100.0, ..valid() }));
        assert!(!rejected(CreateUserRequest { age: 99.0, ..valid() }));
    }

    #[test]
    fn validation_checks_phone_pattern() {
        assert!(rejected(CreateUserRequest { phone_number: Some("9012345678".into()), ..valid() }));
        assert!(rejected(CreateUserRequest { phone_number: Some("0901234".into()), ..valid() }));
        assert!(rejected(CreateUserRequest { phone_number: Some("0901234567890".into()), ..valid() }));
        assert!(!rejected(CreateUserRequest { phone_number: Some("090123456789".into()), ..valid() }));
    }

    #[tokio::test]
    async fn created_user_reads_back_as_summary() {
        let store = MemoryStore::new(USER_KEY);
        let created = create_user(&store, valid()).await.unwrap();
        assert_eq!(created.user_id, "abcdefgh12345678");
        let summary = get_user(&store, "abcdefgh12345678").await.unwrap();
        assert_eq!(summary, UserSummary { name: "Taro".into(), age: "30".into() });
    }

    #[tokio::test]
    async fn invalid_user_is_not_written() {
        let store = MemoryStore::new(USER_KEY);
        assert!(create_user(&store, CreateUserRequest { age: 1.0, ..valid() }).await.is_err());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn post_then_get_over_http() {
        let store = MemoryStore::new(USER_KEY);
        let post = lambda_http::http::Request::builder()
            .method("POST")
            .uri("/prod/users")
            .body(Body::from(r#"{"userId":"abcdefgh12345678","name":"Hanako","age":22}"#))
            .unwrap();
        let resp = function_handler(&store, post).await.unwrap();
        assert_eq!(resp.status(), 201);
        assert_eq!(std::str::from_utf8(resp.body().as_ref()).unwrap(), r#"{"userId":"abcdefgh12345678"}"#);

        let get = lambda_http::http::Request::builder()
            .method("GET")
            .uri("/users/abcdefgh12345678")
            .body(Body::Empty)
            .unwrap();
        let resp = function_handler(&store, get).await.unwrap();
        assert_eq!(resp.status(), 200);
        let summary: UserSummary = serde_json::from_slice(resp.body().as_ref()).unwrap();
        assert_eq!(summary, UserSummary { name: "Hanako".into(), age: "22".into() });
    }

    #[tokio::test]
    async fn duplicate_and_missing_users_map_to_status_codes() {
        let store = MemoryStore::new(USER_KEY);
        let body = serde_json::to_string(&valid()).unwrap();
        let post = || lambda_http::http::Request::builder()
            .method("POST")
            .uri("/users")
            .body(Body::from(body.as_str()))
            .unwrap();
        assert_eq!(function_handler(&store, post()).await.unwrap().status(), 201);
        assert_eq!(function_handler(&store, post()).await.unwrap().status(), 409);

        let get = lambda_http::http::Request::builder()
            .method("GET")
            .uri("/users/nobody")
            .body(Body::Empty)
            .unwrap();
        assert_eq!(function_handler(&store, get).await.unwrap().status(), 404);
    }

    #[tokio::test]
    async fn empty_or_malformed_body_is_bad_request() {
        let store = MemoryStore::new(USER_KEY);
        for body in [Body::Empty, Body::from(r#"{"userId":"abcdefgh12345678"}"#)] {
            let req = lambda_http::http::Request::builder()
                .method("POST")
                .uri("/users")
                .body(body)
                .unwrap();
            assert_eq!(function_handler(&store, req).await.unwrap().status(), 400);
        }
        assert_eq!(store.calls(), 0);
    }
}
