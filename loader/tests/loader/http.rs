use std::time::Duration;

use anyhow::Context;
use loader::{
    CancelableLoader, Credentials, ErrorKind, LoadState, RequestConfig,
    ReqwestTransport,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderName, HeaderValue};
use test_helpers::{
    assert_status_failure, spawn_server, unreachable_transport, wait_until,
};

use crate::Item;

#[tokio::test]
async fn fetches_items() -> anyhow::Result<()> {
    let server = spawn_server().await;

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/items"),
        None,
    )
    .context("locator was supplied")?;

    assert_eq!(items.settled().await, LoadState::Success(Item { id: 1 }));
    assert_eq!(server.hits(), 1);

    Ok(())
}

#[tokio::test]
async fn absolute_locator_needs_no_base_url() -> anyhow::Result<()> {
    let server = spawn_server().await;
    let locator = format!("{}/api/items", server.address);

    let mut items = CancelableLoader::<Item>::load(
        ReqwestTransport::new(),
        Some(locator.as_str()),
        None,
    )
    .context("locator was supplied")?;

    assert_eq!(items.settled().await, LoadState::Success(Item { id: 1 }));

    Ok(())
}

#[tokio::test]
async fn error_statuses_become_failures() -> anyhow::Result<()> {
    let server = spawn_server().await;

    for (status, reason) in [
        (StatusCode::NOT_FOUND, "Not Found"),
        (StatusCode::UNAUTHORIZED, "Unauthorized"),
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    ] {
        let locator = format!("/api/status/{}", status.as_u16());
        let mut items = CancelableLoader::<Item>::load(
            server.transport(),
            Some(locator.as_str()),
            None,
        )
        .context("locator was supplied")?;

        let state = items.settled().await;
        assert_status_failure(&state, status);
        assert_eq!(state.error().map(|e| e.message.as_str()), Some(reason));
    }

    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> anyhow::Result<()> {
    let server = spawn_server().await;

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/nothing-here"),
        None,
    )
    .context("locator was supplied")?;

    assert_status_failure(&items.settled().await, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn plain_text_body_fails_to_decode() -> anyhow::Result<()> {
    let server = spawn_server().await;

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/not-json"),
        None,
    )
    .context("locator was supplied")?;

    let state = items.settled().await;
    let error = state.error().context("expected a failure")?;
    assert_eq!(error.kind, ErrorKind::Decode);

    Ok(())
}

#[tokio::test]
async fn posts_json_body() -> anyhow::Result<()> {
    let server = spawn_server().await;
    let config = RequestConfig::post().json(&serde_json::json!({ "id": 5 }))?;

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/echo"),
        Some(config),
    )
    .context("locator was supplied")?;

    assert_eq!(items.settled().await, LoadState::Success(Item { id: 5 }));

    Ok(())
}

#[tokio::test]
async fn sends_configured_headers() -> anyhow::Result<()> {
    let server = spawn_server().await;
    let config = RequestConfig::get()
        .header(
            HeaderName::from_static("x-client"),
            HeaderValue::from_static("loader-tests"),
        )
        .bearer_auth("abc123")?
        .timeout(Duration::from_secs(5));

    let mut echoed = CancelableLoader::<serde_json::Value>::load(
        server.transport(),
        Some("/api/headers"),
        Some(config),
    )
    .context("locator was supplied")?;

    assert_eq!(
        echoed.settled().await,
        LoadState::Success(serde_json::json!({
            "client": "loader-tests",
            "authorization": "Bearer abc123",
        }))
    );

    Ok(())
}

#[tokio::test]
async fn credentials_mode_is_ignored_natively() -> anyhow::Result<()> {
    let server = spawn_server().await;
    let config = RequestConfig::get().credentials(Credentials::Include);

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/items"),
        Some(config),
    )
    .context("locator was supplied")?;

    assert_eq!(items.settled().await, LoadState::Success(Item { id: 1 }));

    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() -> anyhow::Result<()> {
    let mut items = CancelableLoader::<Item>::load(
        unreachable_transport(),
        Some("/api/items"),
        None,
    )
    .context("locator was supplied")?;

    let state = items.settled().await;
    let error = state.error().context("expected a failure")?;
    assert_eq!(error.kind, ErrorKind::Transport);
    assert_eq!(error.status, None);

    Ok(())
}

#[tokio::test]
async fn teardown_abandons_slow_request() -> anyhow::Result<()> {
    let server = spawn_server().await;

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/slow"),
        None,
    )
    .context("locator was supplied")?;
    wait_until(|| server.hits() == 1).await;

    items.teardown();
    let state = tokio::time::timeout(Duration::from_secs(5), items.settled())
        .await
        .context("teardown did not abandon the request")?;

    assert_eq!(state, LoadState::Loading);
    assert_eq!(items.cell().transitions(), 1);

    Ok(())
}

#[tokio::test]
async fn timeout_is_transport_failure() -> anyhow::Result<()> {
    let server = spawn_server().await;
    let config = RequestConfig::get().timeout(Duration::from_millis(100));

    let mut items = CancelableLoader::<Item>::load(
        server.transport(),
        Some("/api/slow"),
        Some(config),
    )
    .context("locator was supplied")?;

    let state = items.settled().await;
    let error = state.error().context("expected a failure")?;
    assert_eq!(error.kind, ErrorKind::Transport);

    Ok(())
}
