use std::time::Duration;

use super::*;

fn sample_client() -> RemoteCache {
    RemoteCache::new(RemoteCacheConfig {
        endpoint: "https://cache.example.internal/v1".to_string(),
        auth_token: Some("secret-token".to_string()),
        timeout: Duration::from_secs(5),
    })
    .expect("client builds without making any network call")
}

#[test]
fn entry_url_strips_trailing_slash_and_appends_fingerprint() {
    let client = sample_client();
    let fp = crate::fingerprint::hash_bytes(b"entry");
    let url = client.entry_url(&fp);
    assert_eq!(
        url,
        format!("https://cache.example.internal/v1/entries/{fp}")
    );
}

#[test]
fn blob_url_uses_blobs_prefix() {
    let client = sample_client();
    let hash = crate::fingerprint::hash_bytes(b"blob");
    let url = client.blob_url(&hash);
    assert_eq!(url, format!("https://cache.example.internal/v1/blobs/{hash}"));
}

#[test]
fn missing_endpoint_trailing_slash_still_joins_correctly() {
    let client = RemoteCache::new(RemoteCacheConfig {
        endpoint: "https://cache.example.internal/v1/".to_string(),
        auth_token: None,
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let fp = crate::fingerprint::hash_bytes(b"entry");
    assert!(!client.entry_url(&fp).contains("//entries"));
}
