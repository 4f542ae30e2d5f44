use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cc_client::{
    CcError, ClientErrorCode, Command, CommandParams, ParamsTransformer, RequestCommand,
    RequestConfigOverride, RequestDescriptor, ResponseBody, SimpleCommand,
};
use httpmock::Method::{DELETE, GET, POST};
use serde::Deserialize;
use serde_json::json;
use url::Url;

#[derive(Debug, Deserialize, PartialEq)]
struct Me {
    id: String,
    plan: String,
}

struct GetSelf;

impl SimpleCommand for GetSelf {
    type Output = Me;

    fn to_request_params(&self, _params: &CommandParams) -> Result<RequestDescriptor, CcError> {
        let mut req = RequestDescriptor::get("/self");
        req.headers.accept_json();
        Ok(req)
    }

    fn transform_command_output(&self, body: ResponseBody) -> Result<Me, CcError> {
        body.deserialize()
    }
}

#[tokio::test]
async fn simple_command_joins_base_url_and_decodes_output() {
    let server = crate::common::setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/self")
            .header("accept", "application/json");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"u-1","plan":"pro"}"#);
    });

    let client = cc_client::CcClient::builder()
        .base_url(Url::parse(&format!("{}/v2/", server.base_url())).unwrap())
        .build()
        .unwrap();

    let me = client.send(&Command::simple(GetSelf), None).await.unwrap();

    mock.assert();
    assert_eq!(
        me,
        Me {
            id: "u-1".into(),
            plan: "pro".into()
        }
    );
}

#[tokio::test]
async fn request_command_posts_json_body() {
    let server = crate::common::setup_server();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/items")
            .query_param("dry_run", "false")
            .header("content-type", "application/json")
            .json_body(json!({"name": "widget"}));
        then.status(201)
            .header("content-type", "application/json; charset=utf-8")
            .body(r#"{"id":7}"#);
    });

    let client = crate::common::client_for(&server);
    let cmd: Command<ResponseBody> = RequestCommand::new(
        RequestDescriptor::post("/items")
            .query_param("dry_run", "false")
            .json_body(json!({"name": "widget"})),
    )
    .into();

    let body = client.send(&cmd, None).await.unwrap();

    mock.assert();
    assert_eq!(body, ResponseBody::Json(json!({"id": 7})));
}

#[tokio::test]
async fn non_json_bodies_come_back_as_text() {
    let server = crate::common::setup_server();
    server.mock(|when, then| {
        when.method(GET).path("/motd");
        then.status(200)
            .header("content-type", "text/plain")
            .body("hello");
    });

    let client = crate::common::client_for(&server);
    let cmd: Command<ResponseBody> = RequestCommand::new(RequestDescriptor::get("/motd")).into();

    let body = client.send(&cmd, None).await.unwrap();
    assert_eq!(body.as_text(), Some("hello"));
}

#[tokio::test]
async fn empty_response_policy_returns_fallback_on_204() {
    let server = crate::common::setup_server();
    let mock = server.mock(|when, then| {
        when.method(DELETE).path("/items/7");
        then.status(204);
    });

    let client = crate::common::client_for(&server);
    let cmd: Command<ResponseBody> = RequestCommand::new(RequestDescriptor::delete("/items/7"))
        .on_empty(ResponseBody::Json(json!({"deleted": true})))
        .into();

    let body = client.send(&cmd, None).await.unwrap();

    mock.assert();
    assert_eq!(body, ResponseBody::Json(json!({"deleted": true})));
}

#[tokio::test]
async fn hooks_rewrite_requests_and_observe_responses() {
    let server = crate::common::setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/ping").header("x-trace-id", "abc");
        then.status(200).body("pong");
    });

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_hook = Arc::clone(&seen);
    let client = crate::common::builder_for(&server)
        .on_request(|mut req| {
            req.headers.set("X-Trace-Id", "abc");
            req
        })
        .on_response(move |resp| {
            assert_eq!(resp.status, 200);
            assert!(!resp.cache_hit);
            seen_hook.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let cmd: Command<ResponseBody> = RequestCommand::new(RequestDescriptor::get("/ping")).into();
    client.send(&cmd, None).await.unwrap();

    mock.assert();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

struct OwnerDefaults;

impl ParamsTransformer for OwnerDefaults {
    fn transform_command_params(
        &self,
        mut params: CommandParams,
        _config: &RequestConfigOverride,
    ) -> Result<CommandParams, CcError> {
        if let Some(obj) = params.as_object_mut() {
            obj.entry("owner").or_insert_with(|| json!("me"));
        }
        Ok(params)
    }
}

struct ListItems {
    owner: Option<String>,
}

impl SimpleCommand for ListItems {
    type Output = Vec<String>;

    fn params(&self) -> CommandParams {
        match &self.owner {
            Some(owner) => json!({ "owner": owner }),
            None => json!({}),
        }
    }

    fn to_request_params(&self, params: &CommandParams) -> Result<RequestDescriptor, CcError> {
        let owner = params["owner"].as_str().unwrap_or("nobody");
        Ok(RequestDescriptor::get(format!("/users/{owner}/items")))
    }

    fn transform_command_output(&self, body: ResponseBody) -> Result<Vec<String>, CcError> {
        body.deserialize()
    }
}

#[tokio::test]
async fn params_transformer_fills_in_missing_params() {
    let server = crate::common::setup_server();
    let mine = server.mock(|when, then| {
        when.method(GET).path("/users/me/items");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"["a","b"]"#);
    });
    let theirs = server.mock(|when, then| {
        when.method(GET).path("/users/bob/items");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"["c"]"#);
    });

    let client = crate::common::builder_for(&server)
        .params_transformer(OwnerDefaults)
        .build()
        .unwrap();

    let items = client
        .send(&Command::simple(ListItems { owner: None }), None)
        .await
        .unwrap();
    assert_eq!(items, vec!["a", "b"]);

    let items = client
        .send(
            &Command::simple(ListItems {
                owner: Some("bob".into()),
            }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(items, vec!["c"]);

    mine.assert();
    theirs.assert();
}

#[tokio::test]
async fn per_call_timeout_wins_over_client_timeout() {
    let server = crate::common::setup_server();
    server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200).delay(Duration::from_millis(500)).body("late");
    });

    let client = crate::common::builder_for(&server)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let cmd: Command<ResponseBody> = RequestCommand::new(RequestDescriptor::get("/slow")).into();

    let err = client
        .send(
            &cmd,
            Some(&RequestConfigOverride::new().timeout(Duration::from_millis(50))),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert_eq!(err.client_code(), Some(ClientErrorCode::TimeoutExceeded));
    assert_eq!(err.code(), "TIMEOUT_EXCEEDED");
}
