use aws_sdk_dynamodb::types::AttributeValue;
use common::MemoryStore;
use lambda_runtime::LambdaEvent;
use serde_json::json;
use std::collections::HashMap;
use user_view::{function_handler, GetUserViewRequest, SCORE_VIEW, USER_KEY, WINS_VIEW};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn store() -> MemoryStore {
    let store = MemoryStore::new(USER_KEY);
    store.insert(HashMap::from([
        ("userId".to_string(), AttributeValue::S("u1".into())),
        ("wins".to_string(), AttributeValue::N("5".into())),
        ("topScore".to_string(), AttributeValue::N("99".into())),
        ("email".to_string(), AttributeValue::S("u1@example.com".into()))
    ]));
    store
}

fn event(user_id: Option<&str>) -> LambdaEvent<GetUserViewRequest> {
    LambdaEvent {
        payload: GetUserViewRequest { user_id: user_id.map(String::from) },
        context: Default::default()
    }
}

#[test]
fn test_views_share_one_table() {
    let store = store();
    let wins = block_on(function_handler(&store, &WINS_VIEW, event(Some("u1")))).unwrap();
    let score = block_on(function_handler(&store, &SCORE_VIEW, event(Some("u1")))).unwrap();
    assert_eq!(wins, json!({"userId": "u1", "wins": 5}));
    assert_eq!(score, json!({"userId": "u1", "topScore": 99}));
}

#[test]
fn test_failures_propagate() {
    let store = store();
    let missing = block_on(function_handler(&store, &WINS_VIEW, event(None)));
    assert!(missing.unwrap_err().to_string().contains("userId is required"));
    let unknown = block_on(function_handler(&store, &WINS_VIEW, event(Some("u9"))));
    assert!(unknown.unwrap_err().to_string().contains("no record found"));
    assert_eq!(store.calls(), 1);
}
