//! End-to-end tests of the request pipeline.
//!
//! Each test builds a small API and drives requests through `Api::handle`:
//!
//! 1. Routing - 404 / 405 with `Allow`
//! 2. Authentication - chains, inheritance and opt-out
//! 3. Throttling - 429 with `Retry-After`
//! 4. Binding - values, locations of failures, dependency outputs
//! 5. Response shaping - declared models and statuses
//! 6. Exception handlers - custom error types and debug output

use bytes::Bytes;
use futures_util::future::join_all;
use http::{Method, Response, StatusCode};
use penta::core::{Call, Identity, PentaError, PentaResult, Reply, Request};
use penta::extract::{Dependency, Field, FieldType, Model, Param, Resolved};
use penta::middleware::{ApiKeyHeader, ApiKeyQuery, RateThrottle, ThrottleKey};
use penta::{Api, ApiBuilder, ErrorMatcher, Operation, Responses, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A builder that skips the namespace registry.
fn builder() -> ApiBuilder {
    Api::builder().skip_registry(true)
}

fn json_body(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn get(uri: &str) -> Request {
    Request::builder().uri(uri).build()
}

fn get_item(call: Call) -> PentaResult<Reply> {
    let item_id: i64 = call.arg("item_id")?;
    let q: String = call.arg("q")?;
    Ok(Reply::new(json!({ "item_id": item_id, "q": q })))
}

fn get_item_op() -> Operation {
    Operation::sync("items::get_item", get_item)
        .param(Param::new("item_id", FieldType::Integer))
        .param(Param::new("q", FieldType::String))
}

fn key_verifier(expected: &'static str) -> impl Fn(&str) -> PentaResult<Option<Identity>> + Send + Sync {
    move |key: &str| Ok((key == expected).then(|| Identity::api_key(key)))
}

fn whoami(call: Call) -> PentaResult<Reply> {
    Ok(Reply::new(json!({ "caller": call.identity().log_id() })))
}

#[tokio::test]
async fn test_get_item_round_trip() {
    let api = builder().get("/items/{item_id}", get_item_op()).build().unwrap();

    let response = api.handle(get("/items/123?q=test")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json; charset=utf-8");
    assert_eq!(json_body(&response), json!({ "item_id": 123, "q": "test" }));
}

#[tokio::test]
async fn test_validation_errors_report_every_group() {
    let api = builder()
        .get(
            "/items/{item_id}",
            get_item_op().param(Param::new("x_token", FieldType::String).header()),
        )
        .build()
        .unwrap();

    let response = api.handle(get("/items/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&response);
    let locs: Vec<Value> = body["detail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["loc"].clone())
        .collect();
    assert_eq!(
        locs,
        vec![json!(["path", "item_id"]), json!(["query", "q"]), json!(["header", "x-token"])]
    );
    assert_eq!(body["detail"][0]["type"], "int_parsing");
    assert_eq!(body["detail"][1]["type"], "missing");
}

#[tokio::test]
async fn test_missing_header_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let op = Operation::sync("secure::read", move |_call: Call| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Reply::empty())
    })
    .param(Param::new("x_token", FieldType::String).header());
    let api = builder().get("/secure", op).build().unwrap();

    let response = api.handle(get("/secure")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(&response)["detail"][0]["loc"], json!(["header", "x-token"]));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let request = Request::builder().uri("/secure").header("X-Token", "t").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forbidden_extra_body_field() {
    let item = Model::new("Item")
        .field(Field::new("name", FieldType::String))
        .forbid_extra();
    let op = Operation::sync("items::create_item", |call: Call| {
        let payload: Value = call.arg("payload")?;
        Ok(Reply::with_status(StatusCode::CREATED, payload))
    })
    .param(Param::new("payload", FieldType::model(item)))
    .responses(Responses::new().untyped(201));
    let api = builder().post("/items", op).build().unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/items")
        .json(&json!({ "name": "hat", "extra": 1 }))
        .build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = &json_body(&response)["detail"][0];
    assert_eq!(detail["loc"], json!(["body", "payload", "extra"]));
    assert_eq!(detail["type"], "extra_forbidden");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/items")
        .json(&json!({ "name": "hat" }))
        .build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(&response), json!({ "name": "hat" }));
}

#[tokio::test]
async fn test_path_values_are_decoded() {
    let greet = Operation::sync("users::greet", |call: Call| {
        let name: String = call.arg("name")?;
        Ok(Reply::new(json!({ "name": name })))
    })
    .param(Param::new("name", FieldType::String));
    let api = builder().get("/users/{name}", greet).build().unwrap();

    let response = api.handle(get("/users/J%C3%BCrgen%20K")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "name": "Jürgen K" }));

    let response = api.handle(get("/users/%C3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let router = Router::new();
    router.get("/{item_id}", get_item_op()).unwrap();
    router
        .post("/{item_id}", Operation::sync("items::touch", |_call: Call| Ok(Reply::empty())))
        .unwrap();
    let api = builder().add_router("/items", &router).build().unwrap();

    let response = api.handle(get("/nothing/here")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(&response), json!({ "detail": "Not Found" }));

    let request = Request::builder().method(Method::DELETE).uri("/items/1").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, POST");
}

#[tokio::test]
async fn test_auth_chain_tries_in_order() {
    let api = builder()
        .auth(ApiKeyQuery::new("api_key", key_verifier("query-secret")))
        .auth(ApiKeyHeader::new("X-API-Key", key_verifier("header-secret")))
        .get("/me", Operation::sync("me::whoami", whoami))
        .build()
        .unwrap();

    let response = api.handle(get("/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response), json!({ "detail": "Unauthorized" }));

    let response = api.handle(get("/me?api_key=query-secret")).await.unwrap();
    assert_eq!(json_body(&response), json!({ "caller": "apikey:query-secret" }));

    // A rejected query key falls through to the header authenticator.
    let request = Request::builder()
        .uri("/me?api_key=wrong")
        .header("X-API-Key", "header-secret")
        .build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "caller": "apikey:header-secret" }));
}

#[tokio::test]
async fn test_auth_inheritance_and_opt_out() {
    let public = Router::new().no_auth();
    public
        .get("/status", Operation::sync("public::status", whoami))
        .unwrap();
    let admin = Router::new().auth(ApiKeyHeader::new("X-Admin", key_verifier("root")));
    admin
        .get("/stats", Operation::sync("admin::stats", whoami))
        .unwrap();
    admin
        .get("/ping", Operation::sync("admin::ping", whoami).no_auth())
        .unwrap();

    let api = builder()
        .auth(ApiKeyHeader::new("X-API-Key", key_verifier("user")))
        .get("/me", Operation::sync("me::whoami", whoami))
        .add_router("/public", &public)
        .add_router("/admin", &admin)
        .build()
        .unwrap();

    let response = api.handle(get("/public/status")).await.unwrap();
    assert_eq!(json_body(&response), json!({ "caller": "anonymous" }));

    let request = Request::builder().uri("/admin/stats").header("X-API-Key", "user").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder().uri("/admin/stats").header("X-Admin", "root").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(json_body(&response), json!({ "caller": "apikey:root" }));

    let response = api.handle(get("/admin/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_throttled_requests_get_retry_after() {
    let api = builder()
        .throttle(RateThrottle::new("2/m").unwrap().key(ThrottleKey::Global))
        .get("/ping", Operation::sync("ping", |_call: Call| Ok(Reply::new(json!("pong")))))
        .get(
            "/free",
            Operation::sync("free", |_call: Call| Ok(Reply::new(json!("ok")))).no_throttle(),
        )
        .build()
        .unwrap();

    for _ in 0..2 {
        let response = api.handle(get("/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = api.handle(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    let response = api.handle(get("/free")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

struct Database {
    name: String,
}

struct Session {
    user: String,
    database: String,
}

#[tokio::test]
async fn test_dependencies_resolve_in_order() {
    let database = Dependency::sync("database", |_resolved: &Resolved| {
        Ok(Database {
            name: "main".to_string(),
        })
    });
    let session = Dependency::asynchronous("session", |resolved: Resolved| async move {
        let user: String = resolved.arg("x_user")?;
        let database = resolved.dep::<Database>("db")?;
        Ok::<_, PentaError>(Session {
            user,
            database: database.name.clone(),
        })
    })
    .param(Param::new("x_user", FieldType::String).header())
    .param(Param::depends("db", "database"));

    let op = Operation::sync("me::session", |call: Call| {
        let session = call.dep::<Session>("session")?;
        Ok(Reply::new(json!({ "user": session.user, "db": session.database })))
    })
    .param(Param::depends("session", "session"));

    let api = builder()
        .dependency(database)
        .dependency(session)
        .get("/session", op)
        .build()
        .unwrap();

    let response = api.handle(get("/session")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(&response)["detail"][0]["loc"], json!(["header", "x-user"]));

    let request = Request::builder().uri("/session").header("X-User", "ada").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(json_body(&response), json!({ "user": "ada", "db": "main" }));
}

#[tokio::test]
async fn test_unknown_dependency_fails_build() {
    let op = Operation::sync("a", |_call: Call| Ok(Reply::empty()))
        .param(Param::depends("db", "database"));
    let err = builder().get("/a", op).build().unwrap_err();
    assert!(matches!(err, PentaError::Configuration { .. }));
}

fn item_out() -> Model {
    Model::new("ItemOut")
        .field(Field::new("id", FieldType::Integer))
        .field(Field::new("display_name", FieldType::String).alias("displayName"))
        .field(Field::new("note", FieldType::String).optional())
}

#[tokio::test]
async fn test_response_models_shape_payloads() {
    let op = Operation::sync("items::read", |_call: Call| {
        Ok(Reply::new(json!({
            "id": "7",
            "display_name": "Hat",
            "note": null,
            "secret": "dropped"
        })))
    })
    .response(200, Some(item_out()));
    let aliased = Operation::sync("items::read_aliased", |_call: Call| {
        Ok(Reply::new(json!({ "id": 7, "display_name": "Hat", "note": null })))
    })
    .response(200, Some(item_out()))
    .by_alias(true)
    .exclude_none(true);

    let api = builder()
        .get("/items/plain", op)
        .get("/items/aliased", aliased)
        .build()
        .unwrap();

    let response = api.handle(get("/items/plain")).await.unwrap();
    assert_eq!(
        json_body(&response),
        json!({ "id": 7, "display_name": "Hat", "note": null })
    );

    let response = api.handle(get("/items/aliased")).await.unwrap();
    assert_eq!(json_body(&response), json!({ "id": 7, "displayName": "Hat" }));
}

#[tokio::test]
async fn test_response_status_rules() {
    let mismatch = Operation::sync("bad::shape", |_call: Call| {
        Ok(Reply::new(json!({ "id": "not a number", "display_name": "x" })))
    })
    .response(200, Some(item_out()));
    let undeclared = Operation::sync("bad::status", |_call: Call| {
        Ok(Reply::with_status(StatusCode::ACCEPTED, json!({})))
    })
    .response(200, None);
    let empty = Operation::sync("items::delete", |_call: Call| Ok(Reply::new(json!({ "ignored": true }))))
        .response(204, None);

    let api = builder()
        .get("/mismatch", mismatch)
        .get("/undeclared", undeclared)
        .delete("/items", empty)
        .build()
        .unwrap();

    let err = api.handle(get("/mismatch")).await.unwrap_err();
    assert!(matches!(err, PentaError::Internal { .. }));

    let response = api.handle(get("/undeclared")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&response), json!({ "detail": "Internal configuration error" }));

    let request = Request::builder().method(Method::DELETE).uri("/items").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.body().is_empty());
}

#[derive(Debug, thiserror::Error)]
#[error("item {0} is out of stock")]
struct OutOfStock(i64);

#[tokio::test]
async fn test_custom_exception_handler() {
    let op = Operation::sync("items::buy", |call: Call| {
        let item_id: i64 = call.arg("item_id")?;
        Err(PentaError::custom(OutOfStock(item_id)))
    })
    .param(Param::new("item_id", FieldType::Integer));

    let api = builder()
        .exception_handler(ErrorMatcher::of::<OutOfStock>(), |_req: &Request, error: &PentaError| {
            Reply::with_status(StatusCode::CONFLICT, json!({ "message": error.to_string() }))
        })
        .post("/items/{item_id}/buy", op)
        .build()
        .unwrap();

    let request = Request::builder().method(Method::POST).uri("/items/5/buy").build();
    let response = api.handle(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(&response), json!({ "message": "item 5 is out of stock" }));
}

#[tokio::test]
async fn test_debug_mode_renders_unhandled_errors() {
    let failing = || {
        Operation::sync("boom", |_call: Call| -> PentaResult<Reply> {
            Err(PentaError::internal("database unreachable"))
        })
    };

    let api = builder().get("/boom", failing()).build().unwrap();
    let err = api.handle(get("/boom")).await.unwrap_err();
    assert!(err.to_string().contains("database unreachable"));

    let api = builder().debug(true).get("/boom", failing()).build().unwrap();
    let response = api.handle(get("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
    assert!(String::from_utf8_lossy(response.body()).contains("database unreachable"));

    let response = api.handle(get("/missing")).await.unwrap();
    assert!(json_body(&response)["detail"]
        .as_str()
        .unwrap()
        .starts_with("Not Found: "));
}

#[tokio::test]
async fn test_concurrent_requests() {
    let api = Arc::new(builder().get("/items/{item_id}", get_item_op()).build().unwrap());

    let requests = (0..32).map(|i| {
        let api = Arc::clone(&api);
        async move {
            let response = api
                .handle(get(&format!("/items/{i}?q=n{i}")))
                .await
                .unwrap();
            json_body(&response)
        }
    });
    let bodies = join_all(requests).await;
    for (i, body) in bodies.into_iter().enumerate() {
        assert_eq!(body, json!({ "item_id": i, "q": format!("n{i}") }));
    }

    let spawned = tokio::spawn({
        let api = Arc::clone(&api);
        async move { api.handle(get("/items/1?q=x")).await.map(|r| r.status()) }
    });
    assert_eq!(spawned.await.unwrap().unwrap(), StatusCode::OK);
}
