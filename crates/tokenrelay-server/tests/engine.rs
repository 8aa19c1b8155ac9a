//! End-to-end tests wiring the engine against the in-memory transport.

use core::time::Duration;
use std::sync::Arc;
use std::time::SystemTime;
use tokenrelay_core::record::{TokenRequest, TokenResponse};
use tokenrelay_core::{Error, codec};
use tokenrelay_server::engine::ingest::{run_cache_writer, run_response_ingest};
use tokenrelay_server::engine::{ReplayBus, RequestDispatcher, ResponseCache, TokenIssuer};
use tokenrelay_server::issuance::{IssuancePool, SimulatedIssuer, run_request_processor};
use tokenrelay_server::transport::ResponseChannel;
use tokenrelay_server::transport::memory::{
    MemoryResponseChannel, RequestRecord, request_channel,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const GRACE: Duration = Duration::from_secs(30);
const VALIDITY: Duration = Duration::from_secs(60);

/// Engine wired to the in-memory transport, with the issuance stage left
/// to each test to provide.
struct Harness {
    issuer: TokenIssuer,
    cache: Arc<ResponseCache>,
    requests_rx: mpsc::Receiver<RequestRecord>,
    responses: Arc<MemoryResponseChannel>,
    shutdown: CancellationToken,
}

async fn harness() -> Harness {
    let (requests_tx, requests_rx) = request_channel(16);
    let responses = Arc::new(MemoryResponseChannel::new(16));
    let bus = Arc::new(ReplayBus::new(64));
    let cache = Arc::new(ResponseCache::new(GRACE));
    let shutdown = CancellationToken::new();

    let cache_subscription = bus.subscribe();
    tokio::spawn(run_response_ingest(
        responses.clone() as Arc<dyn ResponseChannel>,
        bus.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(run_cache_writer(
        cache_subscription,
        cache.clone(),
        shutdown.clone(),
    ));
    // Let the ingest task attach to the response channel before any
    // records are published.
    tokio::task::yield_now().await;

    let issuer = TokenIssuer::new(
        cache.clone(),
        bus,
        RequestDispatcher::new(Arc::new(requests_tx)),
        WAIT_TIMEOUT,
    );

    Harness {
        issuer,
        cache,
        requests_rx,
        responses,
        shutdown,
    }
}

/// Responds to every dispatched request with an issued record, echoing
/// the correlation id.
fn spawn_echo_responder(
    mut requests_rx: mpsc::Receiver<RequestRecord>,
    responses: Arc<MemoryResponseChannel>,
) {
    tokio::spawn(async move {
        while let Some(record) = requests_rx.recv().await {
            let request = codec::decode_request(&record.payload).unwrap();
            let response = TokenResponse::from_request(&request).with_token(
                "TOKEN",
                VALIDITY,
                SystemTime::now(),
            );
            responses
                .publish(codec::encode_response(&response).unwrap())
                .await
                .unwrap();
        }
    });
}

#[tokio::test]
async fn fresh_cache_entry_short_circuits_dispatch() {
    let mut h = harness().await;

    let cached = TokenResponse::from_request(&TokenRequest::new("alice", "s3cret")).with_token(
        "TOKEN",
        VALIDITY,
        SystemTime::now(),
    );
    h.cache.put(cached.clone());

    let response = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap();

    // The earlier response is returned as-is and no request went out.
    assert_eq!(response, cached);
    assert!(h.requests_rx.try_recv().is_err());

    h.shutdown.cancel();
}

#[tokio::test]
async fn cache_miss_dispatches_once_and_resolves_on_the_matching_event() {
    let mut h = harness().await;

    let request = TokenRequest::new("alice", "s3cret");
    let correlation_id = request.correlation_id;
    let issue = tokio::spawn({
        let issuer = h.issuer.clone();
        async move { issuer.issue(request).await }
    });

    let record = h.requests_rx.recv().await.unwrap();
    assert_eq!(record.key, "alice");
    let dispatched = codec::decode_request(&record.payload).unwrap();
    assert_eq!(dispatched.correlation_id, correlation_id);

    // An unrelated event first; the waiter must ignore it.
    let other = TokenResponse::from_request(&TokenRequest::new("bob", "cred")).with_token(
        "TOKEN",
        VALIDITY,
        SystemTime::now(),
    );
    h.responses
        .publish(codec::encode_response(&other).unwrap())
        .await
        .unwrap();

    let matching = TokenResponse::from_request(&dispatched).with_token(
        "TOKEN",
        VALIDITY,
        SystemTime::now(),
    );
    h.responses
        .publish(codec::encode_response(&matching).unwrap())
        .await
        .unwrap();

    let response = issue.await.unwrap().unwrap();
    assert_eq!(response.correlation_id, correlation_id);
    assert_eq!(response.token.as_deref(), Some("TOKEN"));

    // Exactly one dispatch for one miss.
    assert!(h.requests_rx.try_recv().is_err());

    h.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_after_dispatching() {
    let mut h = harness().await;

    let request = TokenRequest::new("alice", "s3cret");
    let correlation_id = request.correlation_id;

    let err = h.issuer.issue(request).await.unwrap_err();
    assert!(matches!(err, Error::TimedOut { correlation_id: id } if id == correlation_id));

    // The request was dispatched before the wait began.
    let record = h.requests_rx.recv().await.unwrap();
    assert_eq!(record.key, "alice");
    assert!(h.requests_rx.try_recv().is_err());

    h.shutdown.cancel();
}

#[tokio::test]
async fn dispatch_failure_is_distinct_from_a_timeout() {
    let h = harness().await;
    drop(h.requests_rx);

    let err = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DispatchFailed { .. }));

    h.shutdown.cancel();
}

#[tokio::test]
async fn late_duplicate_events_only_update_the_cache() {
    let mut h = harness().await;

    spawn_echo_responder(h.requests_rx, h.responses.clone());
    let first = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap();

    // A later event for the same user lands with no waiter attached.
    let late = TokenResponse::from_request(&TokenRequest::new("alice", "s3cret")).with_token(
        "TOKEN",
        VALIDITY,
        SystemTime::now() + Duration::from_secs(1),
    );
    h.responses
        .publish(codec::encode_response(&late).unwrap())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if h.cache.get("alice").as_ref() == Some(&late) {
                return;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    // The next caller observes the newer entry without dispatching.
    let second = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap();
    assert_eq!(second, late);
    assert_ne!(second.correlation_id, first.correlation_id);

    h.shutdown.cancel();
}

#[tokio::test]
async fn malformed_response_records_do_not_break_correlation() {
    let mut h = harness().await;

    let request = TokenRequest::new("alice", "s3cret");
    let issue = tokio::spawn({
        let issuer = h.issuer.clone();
        let request = request.clone();
        async move { issuer.issue(request).await }
    });

    let record = h.requests_rx.recv().await.unwrap();
    let dispatched = codec::decode_request(&record.payload).unwrap();

    h.responses.publish(b"garbage".to_vec()).await.unwrap();

    let matching = TokenResponse::from_request(&dispatched).with_token(
        "TOKEN",
        VALIDITY,
        SystemTime::now(),
    );
    h.responses
        .publish(codec::encode_response(&matching).unwrap())
        .await
        .unwrap();

    let response = issue.await.unwrap().unwrap();
    assert_eq!(response.correlation_id, request.correlation_id);

    h.shutdown.cancel();
}

#[tokio::test]
async fn full_pipeline_issues_then_serves_from_cache() {
    let h = harness().await;

    // Real issuance stage, zero latency.
    let pool = Arc::new(IssuancePool::spawn(
        2,
        Arc::new(SimulatedIssuer::new(Duration::ZERO, Duration::ZERO)),
        h.responses.clone(),
        VALIDITY,
        h.shutdown.clone(),
    ));
    tokio::spawn(run_request_processor(
        h.requests_rx,
        pool,
        h.shutdown.clone(),
    ));

    let first = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap();
    assert_eq!(first.token.as_deref(), Some("TOKEN"));
    assert_eq!(first.user, "alice");

    // Wait for the cache writer to observe the event, then the second
    // call must return the first response verbatim.
    tokio::time::timeout(Duration::from_secs(1), async {
        while h.cache.get("alice").is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let second = h
        .issuer
        .issue(TokenRequest::new("alice", "s3cret"))
        .await
        .unwrap();
    assert_eq!(second, first);

    h.shutdown.cancel();
}
