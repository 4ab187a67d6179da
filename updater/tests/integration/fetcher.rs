//! `HttpFetcher` against a local HTTP server.

#![allow(clippy::expect_used)]

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use sha2::{Digest, Sha256};
use url::Url;

use agent_updater::application::ports::ArtifactFetcher;
use agent_updater::infra::fetcher::HttpFetcher;

const BODY: &[u8] = b"#!/bin/sh\necho agent 3.1.4\n";

async fn serve() -> SocketAddr {
    let app = Router::new().route("/agent", get(|| async { BODY }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).expect("url")
}

fn body_hash() -> String {
    format!("{:x}", Sha256::digest(BODY))
}

fn leftovers(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read_dir")
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn download_with_matching_hash_lands_at_destination() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("download");

    HttpFetcher::new()
        .expect("client")
        .fetch(&url(addr, "/agent"), &dest, &body_hash())
        .await
        .expect("fetch");

    assert_eq!(std::fs::read(&dest).expect("read"), BODY);
    assert_eq!(leftovers(dir.path()), ["download"]);
}

#[tokio::test]
async fn hash_comparison_ignores_case() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("download");

    HttpFetcher::new()
        .expect("client")
        .fetch(&url(addr, "/agent"), &dest, &body_hash().to_ascii_uppercase())
        .await
        .expect("fetch");

    assert!(dest.exists());
}

#[tokio::test]
async fn hash_mismatch_leaves_nothing_behind() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("download");

    let err = HttpFetcher::new()
        .expect("client")
        .fetch(&url(addr, "/agent"), &dest, &"0".repeat(64))
        .await
        .expect_err("mismatch");

    assert!(err.to_string().contains("SHA-256 mismatch"), "{err}");
    assert!(leftovers(dir.path()).is_empty());
}

#[tokio::test]
async fn http_error_status_fails() {
    let addr = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("download");

    let result = HttpFetcher::new()
        .expect("client")
        .fetch(&url(addr, "/missing"), &dest, &body_hash())
        .await;

    assert!(result.is_err());
    assert!(!dest.exists());
}
