// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Remote cache HTTP client (§10.R).
//!
//! A thin blocking client over the remote cache wire protocol:
//! `GET /entries/{fingerprint}` returns a postcard-encoded [`CacheEntry`],
//! `PUT /entries/{fingerprint}` stores one, and `GET`/`PUT /blobs/{hash}`
//! transfer the underlying content. Requests carry a bearer token from
//! configuration. A `429` response backs off according to `Retry-After`
//! (or a default) and is retried a bounded number of times before the
//! caller treats the push/fetch as failed — callers never block a build
//! indefinitely on a misbehaving remote.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::cache::CacheEntry;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(500);

/// Configuration for the remote cache tier (§10.R, §10.M).
#[derive(Debug, Clone)]
pub struct RemoteCacheConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

/// HTTP client for the remote action cache tier.
pub struct RemoteCache {
    client: Client,
    config: RemoteCacheConfig,
}

impl RemoteCache {
    pub fn new(config: RemoteCacheConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn entry_url(&self, fingerprint: &Fingerprint) -> String {
        format!("{}/entries/{}", self.config.endpoint.trim_end_matches('/'), fingerprint)
    }

    fn blob_url(&self, hash: &Fingerprint) -> String {
        format!("{}/blobs/{}", self.config.endpoint.trim_end_matches('/'), hash)
    }

    fn authed(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch a cache entry. Returns `Ok(None)` on a `404`, which is a normal
    /// miss rather than an error.
    pub fn fetch_entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        self.with_retries(|| {
            let response = self
                .authed(self.client.get(self.entry_url(fingerprint)))
                .send()
                .map_err(|e| Error::Network(e.to_string()))?;

            match response.status() {
                StatusCode::OK => {
                    let bytes = response.bytes().map_err(|e| Error::Network(e.to_string()))?;
                    let entry: CacheEntry = postcard::from_bytes(&bytes)?;
                    Ok(RetryOutcome::Done(Some(entry)))
                }
                StatusCode::NOT_FOUND => Ok(RetryOutcome::Done(None)),
                StatusCode::TOO_MANY_REQUESTS => Ok(RetryOutcome::Retry(retry_after(&response))),
                status => Err(Error::Network(format!("unexpected status {status}"))),
            }
        })
    }

    /// Push a cache entry. Idempotent on the server side; forge never
    /// depends on the response body.
    pub fn push_entry(&self, fingerprint: &Fingerprint, entry: &CacheEntry) -> Result<()> {
        let body = postcard::to_allocvec(entry)?;
        self.with_retries(|| {
            let response = self
                .authed(self.client.put(self.entry_url(fingerprint)))
                .body(body.clone())
                .send()
                .map_err(|e| Error::Network(e.to_string()))?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                    Ok(RetryOutcome::Done(()))
                }
                StatusCode::TOO_MANY_REQUESTS => Ok(RetryOutcome::Retry(retry_after(&response))),
                status => Err(Error::Network(format!("unexpected status {status}"))),
            }
        })
    }

    /// Fetch a blob's raw bytes by content hash.
    pub fn fetch_blob(&self, hash: &Fingerprint) -> Result<Option<Vec<u8>>> {
        self.with_retries(|| {
            let response = self
                .authed(self.client.get(self.blob_url(hash)))
                .send()
                .map_err(|e| Error::Network(e.to_string()))?;

            match response.status() {
                StatusCode::OK => {
                    let bytes = response.bytes().map_err(|e| Error::Network(e.to_string()))?;
                    Ok(RetryOutcome::Done(Some(bytes.to_vec())))
                }
                StatusCode::NOT_FOUND => Ok(RetryOutcome::Done(None)),
                StatusCode::TOO_MANY_REQUESTS => Ok(RetryOutcome::Retry(retry_after(&response))),
                status => Err(Error::Network(format!("unexpected status {status}"))),
            }
        })
    }

    /// Push a blob's raw bytes.
    pub fn push_blob(&self, hash: &Fingerprint, bytes: &[u8]) -> Result<()> {
        self.with_retries(|| {
            let response = self
                .authed(self.client.put(self.blob_url(hash)))
                .body(bytes.to_vec())
                .send()
                .map_err(|e| Error::Network(e.to_string()))?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                    Ok(RetryOutcome::Done(()))
                }
                StatusCode::TOO_MANY_REQUESTS => Ok(RetryOutcome::Retry(retry_after(&response))),
                status => Err(Error::Network(format!("unexpected status {status}"))),
            }
        })
    }

    fn with_retries<T>(&self, mut attempt: impl FnMut() -> Result<RetryOutcome<T>>) -> Result<T> {
        let mut tries = 0;
        loop {
            match attempt()? {
                RetryOutcome::Done(value) => return Ok(value),
                RetryOutcome::Retry(delay) => {
                    tries += 1;
                    if tries > MAX_RETRIES {
                        return Err(Error::Network(
                            "remote cache rate-limited past retry budget".to_string(),
                        ));
                    }
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

enum RetryOutcome<T> {
    Done(T),
    Retry(Duration),
}

fn retry_after(response: &reqwest::blocking::Response) -> Duration {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
