use std::time::Duration;

use cc_client::{CacheConfig, CacheMode, RequestConfigOverride, RequestDescriptor, RetryPolicy};

#[test]
fn backoff_grows_geometrically() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0);
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(800));

    let flat = RetryPolicy::new(5, Duration::from_millis(250), 1.0);
    assert_eq!(flat.delay_for(4), Duration::from_millis(250));
}

#[test]
fn default_retry_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retry_count, 3);
    assert_eq!(policy.init_retry_timeout, Duration::from_millis(500));
    assert_eq!(policy.backoff_factor, 2.0);
}

#[test]
fn later_layers_win_field_by_field() {
    let client = RequestConfigOverride::new()
        .timeout(Duration::from_secs(10))
        .cache_ttl(Duration::from_secs(60))
        .debug(true);
    let call = RequestConfigOverride::new()
        .timeout(Duration::from_secs(2))
        .cache_mode(CacheMode::Reload);

    let merged = client.merge(&call);
    assert_eq!(merged.timeout, Some(Duration::from_secs(2)));
    assert_eq!(merged.cache_ttl, Some(Duration::from_secs(60)));
    assert_eq!(merged.cache_mode, Some(CacheMode::Reload));
    assert_eq!(merged.debug, Some(true));
    assert_eq!(merged.cors, None);
}

#[test]
fn apply_to_only_touches_set_fields() {
    let req = RequestDescriptor::get("/x")
        .timeout(Duration::from_secs(30))
        .cors(true)
        .cache(Some(CacheConfig::new(Duration::from_secs(5))));

    let same = RequestConfigOverride::new().apply_to(req.clone());
    assert_eq!(same.timeout, Duration::from_secs(30));
    assert!(same.cors);
    assert_eq!(same.cache, Some(CacheConfig::new(Duration::from_secs(5))));

    let bypass = RequestConfigOverride::new()
        .cache_mode(CacheMode::Bypass)
        .timeout(Duration::ZERO)
        .apply_to(req);
    assert_eq!(bypass.timeout, Duration::ZERO);
    assert_eq!(
        bypass.cache,
        Some(CacheConfig::new(Duration::from_secs(5)).mode(CacheMode::Bypass))
    );
}
