//! End-to-end tests for the reset endpoint.

mod common;

use common::{wav_fixture, TestClient, TestServer};
use reqwest::StatusCode;

#[tokio::test]
async fn test_reset_clears_catalog_and_artifacts() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let music_id = client.upload_music_id("song.wav", wav_fixture(7)).await;

    client.process(music_id, &[1, 2]).await;
    let result = client.wait_for_result(music_id).await;
    let final_mix = result["final_mix"].as_str().unwrap().to_string();

    let response = client.reset().await;
    assert_eq!(response.status(), StatusCode::OK);

    let listing: serde_json::Value = client.list_music().await.json().await.unwrap();
    assert!(listing.as_array().unwrap().is_empty());

    // Previously served artifacts are gone.
    let response = client.download(&final_mix).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.progress(music_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_works_again_after_reset() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let bytes = wav_fixture(2);

    let before = client.upload_music_id("song.wav", bytes.clone()).await;
    client.reset().await;
    let after = client.upload_music_id("song.wav", bytes).await;

    // Content hashing is stable across resets.
    assert_eq!(before, after);
    let listing: serde_json::Value = client.list_music().await.json().await.unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);
}
