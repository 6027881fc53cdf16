//! End-to-end collection cycles against stub JSON-RPC servers.
//!
//! Two hyper-based stubs stand in for the network and validator endpoints,
//! each answering the full set of RPC methods from a per-server profile.
//! The `solana` CLI path points at a nonexistent binary, so the blocking
//! tasks fail every cycle; the RPC tasks must be unaffected.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use solana_exporter::{Collector, Config, MetricsRegistry};

const PUB_KEY: &str = "IdEnTiTy111";
const VOTE_KEY: &str = "VoTe111";

/// Per-endpoint canned answers.
#[derive(Clone)]
struct StubProfile {
    slot: u64,
    block_height: u64,
    vote_accounts: Value,
}

fn vote_accounts_with_validator(last_vote: u64) -> Value {
    json!({
        "current": [{
            "votePubkey": VOTE_KEY,
            "nodePubkey": PUB_KEY,
            "activatedStake": 12_000_000_000u64,
            "commission": 7,
            "epochVoteAccount": true,
            "epochCredits": [[640, 300, 260]],
            "lastVote": last_vote,
        }],
        "delinquent": []
    })
}

fn vote_accounts_without_validator() -> Value {
    json!({
        "current": [{
            "votePubkey": "SomeOtherVote",
            "nodePubkey": "SomeOtherNode",
            "activatedStake": 9_000_000_000u64,
            "commission": 10,
            "epochVoteAccount": true,
            "epochCredits": [[640, 150, 100]],
            "lastVote": 1990,
        }],
        "delinquent": []
    })
}

fn respond(request: &Value, profile: &StubProfile) -> Value {
    let id = request.get("id").cloned().unwrap_or(json!(0));
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let result = match method {
        "getSlot" => json!(profile.slot),
        "getMaxRetransmitSlot" => json!(profile.slot + 1),
        "getMaxShredInsertSlot" => json!(profile.slot + 2),
        "getBlockHeight" => json!(profile.block_height),
        "getBalance" => json!({"context": {"slot": profile.slot}, "value": 1_500_000_000u64}),
        "getEpochInfo" => json!({
            "epoch": 640,
            "slotIndex": 100,
            "slotsInEpoch": 432000,
            "transactionCount": 7_000_000u64,
        }),
        "getEpochSchedule" => json!({
            "firstNormalEpoch": 0,
            "firstNormalSlot": 0,
            "slotsPerEpoch": 432000,
        }),
        "getLeaderSchedule" => json!({ PUB_KEY: [10, 20, 431999] }),
        "getRecentPerformanceSamples" => json!([{"numSlots": 120, "samplePeriodSecs": 60}]),
        "getHealth" => json!("ok"),
        "getVersion" => json!({"solana-core": "1.14.17"}),
        "getVoteAccounts" => profile.vote_accounts.clone(),
        _ => Value::Null,
    };
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

async fn handle(
    req: Request<Incoming>,
    profile: Arc<StubProfile>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let body = req
        .into_body()
        .collect()
        .await
        .expect("read request body")
        .to_bytes();
    let request: Value = serde_json::from_slice(&body).expect("request is JSON");

    let reply = match &request {
        Value::Array(items) => Value::Array(items.iter().map(|r| respond(r, &profile)).collect()),
        single => respond(single, &profile),
    };

    Ok(Response::builder()
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(reply.to_string())))
        .expect("build response"))
}

async fn spawn_stub(profile: StubProfile) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    let profile = Arc::new(profile);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let io = TokioIo::new(stream);
            let profile = profile.clone();
            tokio::spawn(async move {
                let svc = service_fn(move |req| handle(req, profile.clone()));
                let _ = http1::Builder::new().serve_connection(io, svc).await;
            });
        }
    });

    addr
}

fn test_config(network: SocketAddr, validator: SocketAddr) -> Config {
    Config {
        pub_key: PUB_KEY.to_string(),
        vote_pub_key: VOTE_KEY.to_string(),
        network_rpc_endpoint: format!("http://{network}"),
        validator_rpc_endpoint: format!("http://{validator}"),
        // The blocking CLI tasks must fail without affecting the RPC group.
        solana_binary_path: "/nonexistent/solana-cli".to_string(),
        thread_pool_size: 2,
        retry: 1,
        ..Config::default()
    }
}

#[tokio::test]
async fn failing_cli_tasks_do_not_block_rpc_tasks() {
    let network = spawn_stub(StubProfile {
        slot: 1000,
        block_height: 5000,
        vote_accounts: vote_accounts_with_validator(2000),
    })
    .await;
    let validator = spawn_stub(StubProfile {
        slot: 998,
        block_height: 4990,
        vote_accounts: vote_accounts_with_validator(1995),
    })
    .await;

    let metrics = Arc::new(MetricsRegistry::new().expect("registry"));
    let collector = Collector::new(test_config(network, validator), metrics.clone());

    collector.collect().await;

    // Slot comparison: validator 998 vs network 1000.
    assert_eq!(metrics.slot.net_current_slot.get(), 1000.0);
    assert_eq!(metrics.slot.current_slot.get(), 998.0);
    assert_eq!(metrics.slot.slot_diff.get(), -2.0);
    assert_eq!(metrics.slot.block_height_diff.get(), -10.0);

    // Vote heights come from each side's getVoteAccounts.
    assert_eq!(metrics.vote.vote_height_diff.get(), -5.0);

    // Single-endpoint tasks ran too.
    assert_eq!(metrics.balance.account_balance.get(), 1.5);
    assert_eq!(metrics.epoch.network_epoch.get(), 640.0);
    assert_eq!(
        metrics
            .health
            .node_health
            .with_label_values(&["healthy", "none"])
            .get(),
        1.0
    );
    assert_eq!(
        metrics
            .version
            .node_version
            .with_label_values(&["1.14.17"])
            .get(),
        1.0
    );
    assert_eq!(metrics.validator.vote_credits.get(), 40.0);

    // The CLI-backed gauges were never written: both blocking tasks failed.
    assert_eq!(metrics.block.total_slots.get(), 0.0);
    assert_eq!(metrics.validator.active_stake.get(), 0.0);
}

#[tokio::test]
async fn unknown_validator_leaves_status_and_stake_unset() {
    let network = spawn_stub(StubProfile {
        slot: 1000,
        block_height: 5000,
        vote_accounts: vote_accounts_without_validator(),
    })
    .await;
    let validator = spawn_stub(StubProfile {
        slot: 1000,
        block_height: 5000,
        vote_accounts: vote_accounts_without_validator(),
    })
    .await;

    let metrics = Arc::new(MetricsRegistry::new().expect("registry"));
    let collector = Collector::new(test_config(network, validator), metrics.clone());

    collector.collect().await;

    // The list-level counts still update.
    assert_eq!(
        metrics
            .validator
            .active_validators
            .with_label_values(&["current"])
            .get(),
        1.0
    );

    // Our validator is in neither list: its gauges keep their defaults.
    assert_eq!(
        metrics
            .validator
            .validator_activated_stake
            .with_label_values(&[PUB_KEY, VOTE_KEY])
            .get(),
        0.0
    );
    assert_eq!(
        metrics
            .validator
            .val_status
            .with_label_values(&["voting"])
            .get(),
        0.0
    );
    assert_eq!(metrics.validator.vote_credits.get(), 0.0);
}

#[tokio::test]
async fn consecutive_cycles_reuse_the_same_registry() {
    let network = spawn_stub(StubProfile {
        slot: 1000,
        block_height: 5000,
        vote_accounts: vote_accounts_with_validator(2000),
    })
    .await;
    let validator = spawn_stub(StubProfile {
        slot: 998,
        block_height: 4990,
        vote_accounts: vote_accounts_with_validator(1995),
    })
    .await;

    let metrics = Arc::new(MetricsRegistry::new().expect("registry"));
    let collector = Collector::new(test_config(network, validator), metrics.clone());

    collector.collect().await;
    let first = metrics.slot.slot_diff.get();
    collector.collect().await;

    assert_eq!(metrics.slot.slot_diff.get(), first);
    // Exposition text renders cleanly after repeated cycles.
    let text = metrics.gather_text();
    assert!(text.contains("solana_slot_diff"));
    assert!(text.contains("solana_node_version"));
}
