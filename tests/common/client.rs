//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all demix-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// POST /music (multipart upload)
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(format!("{}/music", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// GET /music
    pub async fn list_music(&self) -> Response {
        self.client
            .get(format!("{}/music", self.base_url))
            .send()
            .await
            .expect("Music listing request failed")
    }

    /// POST /music/{id}
    pub async fn process(&self, music_id: u64, instruments: &[u8]) -> Response {
        self.client
            .post(format!("{}/music/{}", self.base_url, music_id))
            .json(&json!({ "instruments": instruments }))
            .send()
            .await
            .expect("Process request failed")
    }

    /// GET /music/{id}
    pub async fn progress(&self, music_id: u64) -> Response {
        self.client
            .get(format!("{}/music/{}", self.base_url, music_id))
            .send()
            .await
            .expect("Progress request failed")
    }

    /// GET /job
    pub async fn jobs(&self) -> Response {
        self.client
            .get(format!("{}/job", self.base_url))
            .send()
            .await
            .expect("Jobs request failed")
    }

    /// GET /job/{id}
    pub async fn job(&self, job_id: u64) -> Response {
        self.client
            .get(format!("{}/job/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Job request failed")
    }

    /// GET /download/{name}
    pub async fn download(&self, name: &str) -> Response {
        self.client
            .get(format!("{}/download/{}", self.base_url, name))
            .send()
            .await
            .expect("Download request failed")
    }

    /// POST /reset
    pub async fn reset(&self) -> Response {
        self.client
            .post(format!("{}/reset", self.base_url))
            .send()
            .await
            .expect("Reset request failed")
    }

    /// Uploads a file and returns the registered item's id.
    pub async fn upload_music_id(&self, filename: &str, bytes: Vec<u8>) -> u64 {
        let response = self.upload(filename, bytes).await;
        assert!(
            response.status().is_success(),
            "Upload failed: {:?}",
            response.text().await
        );
        let item: serde_json::Value = response.json().await.expect("Upload response not JSON");
        item["music_id"].as_u64().expect("music_id missing")
    }

    /// Polls progress until a full result (with `final_mix`) is available.
    pub async fn wait_for_result(&self, music_id: u64) -> serde_json::Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(RESULT_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Music {} did not produce a result within {}ms",
                    music_id, RESULT_TIMEOUT_MS
                );
            }

            let response = self.progress(music_id).await;
            if response.status().is_success() {
                let body: serde_json::Value =
                    response.json().await.expect("Progress response not JSON");
                if body.get("final_mix").is_some() {
                    return body;
                }
            }
            tokio::time::sleep(Duration::from_millis(RESULT_POLL_INTERVAL_MS)).await;
        }
    }
}
