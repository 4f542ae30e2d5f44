use std::sync::{Arc, Mutex};
use std::time::Duration;

use cc_client::{
    CacheMode, CcClient, Command, RequestCommand, RequestConfigOverride, RequestDescriptor,
    ResponseBody,
};
use httpmock::Method::GET;
use httpmock::MockServer;

fn quotes(query: &[(&str, &str)]) -> Command<ResponseBody> {
    let mut req = RequestDescriptor::get("/quotes");
    for (k, v) in query {
        req = req.query_param(*k, *v);
    }
    RequestCommand::new(req).into()
}

/// Client caching for a minute, recording the `cache_hit` flag of every response.
fn caching_client(server: &MockServer) -> (CcClient, Arc<Mutex<Vec<bool>>>) {
    let hits: Arc<Mutex<Vec<bool>>> = Arc::default();
    let hook = Arc::clone(&hits);
    let client = crate::common::builder_for(server)
        .cache_ttl(Duration::from_secs(60))
        .on_response(move |resp| hook.lock().unwrap().push(resp.cache_hit))
        .build()
        .unwrap();
    (client, hits)
}

fn mock_quotes(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/quotes");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"price":1}"#);
    })
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let (client, hits) = caching_client(&server);

    let first = client.send(&quotes(&[("a", "1")]), None).await.unwrap();
    let second = client.send(&quotes(&[("a", "1")]), None).await.unwrap();

    mock.assert_calls(1);
    assert_eq!(first, second);
    assert_eq!(*hits.lock().unwrap(), vec![false, true]);
    assert_eq!(client.cache().len().await, 1);
}

#[tokio::test]
async fn query_order_does_not_change_the_cache_key() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let (client, _) = caching_client(&server);

    client
        .send(&quotes(&[("a", "1"), ("b", "2")]), None)
        .await
        .unwrap();
    client
        .send(&quotes(&[("b", "2"), ("a", "1")]), None)
        .await
        .unwrap();
    client.send(&quotes(&[("a", "2")]), None).await.unwrap();

    mock.assert_calls(2);
}

#[tokio::test]
async fn reload_mode_refetches_and_refreshes_the_entry() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let (client, hits) = caching_client(&server);
    let cmd = quotes(&[]);

    client.send(&cmd, None).await.unwrap();
    let reload = RequestConfigOverride::new().cache_mode(CacheMode::Reload);
    client.send(&cmd, Some(&reload)).await.unwrap();
    client.send(&cmd, None).await.unwrap();

    mock.assert_calls(2);
    assert_eq!(*hits.lock().unwrap(), vec![false, false, true]);
}

#[tokio::test]
async fn bypass_mode_neither_reads_nor_writes() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let (client, _) = caching_client(&server);
    let bypass = RequestConfigOverride::new().cache_mode(CacheMode::Bypass);

    client.send(&quotes(&[]), Some(&bypass)).await.unwrap();
    client.send(&quotes(&[]), Some(&bypass)).await.unwrap();

    mock.assert_calls(2);
    assert!(client.cache().is_empty().await);
}

#[tokio::test]
async fn requests_without_cache_config_always_hit_the_network() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let client = crate::common::client_for(&server);

    client.send(&quotes(&[]), None).await.unwrap();
    client.send(&quotes(&[]), None).await.unwrap();

    mock.assert_calls(2);
    assert!(client.cache().is_empty().await);
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let client = crate::common::client_for(&server);
    let short = RequestConfigOverride::new().cache_ttl(Duration::from_millis(50));

    client.send(&quotes(&[]), Some(&short)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    client.send(&quotes(&[]), Some(&short)).await.unwrap();

    mock.assert_calls(2);
}

#[tokio::test]
async fn failures_are_not_cached_and_clear_empties_the_store() {
    let server = crate::common::setup_server();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/flaky");
        then.status(503);
    });
    let (client, _) = caching_client(&server);
    let flaky: Command<ResponseBody> = RequestCommand::new(RequestDescriptor::get("/flaky")).into();

    assert_eq!(client.send(&flaky, None).await.unwrap_err().status(), Some(503));
    assert_eq!(client.send(&flaky, None).await.unwrap_err().status(), Some(503));
    failing.assert_calls(2);
    assert!(client.cache().is_empty().await);

    let ok = mock_quotes(&server);
    client.send(&quotes(&[]), None).await.unwrap();
    assert_eq!(client.cache().len().await, 1);
    client.cache().clear().await;
    client.send(&quotes(&[]), None).await.unwrap();
    ok.assert_calls(2);
}

#[tokio::test]
async fn unbounded_ttl_never_expires() {
    let server = crate::common::setup_server();
    let mock = mock_quotes(&server);
    let client = crate::common::builder_for(&server)
        .cache_ttl(Duration::MAX)
        .build()
        .unwrap();

    client.send(&quotes(&[]), None).await.unwrap();
    let again = client.send(&quotes(&[]), None).await.unwrap();

    mock.assert_calls(1);
    assert_eq!(again, ResponseBody::Json(serde_json::json!({"price": 1})));
    assert_eq!(client.cache().len().await, 1);
}
