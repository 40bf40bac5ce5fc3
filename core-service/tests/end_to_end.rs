//! End-to-end tests of the service façade against a scripted HTTP backend.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use core_runtime::CoreConfig;
use core_service::{CoreError, GachaSyncService};
use core_sync::{SyncError, TaskStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const RECORDS_URL: &str = "http://records.test/api/record/char";
const TOKEN_URL: &str = "http://token.test/token";

/// Token service plus a record API holding `special` pulls in the special
/// pool and nothing elsewhere.
struct ScriptedBackend {
    special: u64,
}

fn ok(body: String) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from(body),
    }
}

fn query(url: &str) -> HashMap<String, String> {
    url.split_once('?')
        .map(|(_, q)| q)
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ScriptedBackend {
    fn token_response(&self, request: &HttpRequest) -> HttpResponse {
        let body = request.body.as_deref().unwrap_or_default();
        if body != b"hgToken=T" {
            return ok(r#"{"code":3,"msg":"token expired"}"#.to_string());
        }

        ok(r#"{"code":0,"data":{"nickName":"Endmin","uid":10001,"roleId":"P1","u8Token":"u8+P1"}}"#.to_string())
    }

    fn records_response(&self, request: &HttpRequest) -> HttpResponse {
        let params = query(&request.url);
        if params.get("token").map(String::as_str) != Some("u8%2BP1") {
            return ok(r#"{"code":1,"msg":"bad token"}"#.to_string());
        }

        if params.get("pool_type").map(String::as_str) != Some("E_CharacterGachaPoolType_Special") {
            return ok(r#"{"code":0,"data":{"list":[],"hasMore":false}}"#.to_string());
        }

        let start = params
            .get("seq_id")
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(self.special, |cursor| cursor.saturating_sub(1));
        let items: Vec<String> = (1..=start)
            .rev()
            .take(5)
            .map(|seq| {
                format!(
                    r#"{{"poolId":"special_1_0_1","poolName":"Scorching Fang","charId":"chr_{seq}","charName":"Operator {seq}","rarity":5,"isFree":false,"isNew":false,"gachaTs":"{ts}","seqId":"{seq}"}}"#,
                    seq = seq,
                    ts = 1_763_712_000_000u64 + seq * 1000,
                )
            })
            .collect();
        let has_more = start > 5;

        ok(format!(
            r#"{{"code":0,"msg":"","data":{{"list":[{}],"hasMore":{}}}}}"#,
            items.join(","),
            has_more
        ))
    }
}

#[async_trait]
impl HttpClient for ScriptedBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        match (request.method, request.url.split('?').next()) {
            (HttpMethod::Post, Some(TOKEN_URL)) => Ok(self.token_response(&request)),
            (HttpMethod::Get, Some(RECORDS_URL)) => Ok(self.records_response(&request)),
            _ => Err(BridgeError::NotAvailable(request.url.clone())),
        }
    }
}

async fn service(special: u64) -> GachaSyncService {
    let config = CoreConfig::builder()
        .in_memory_database()
        .records_api_url(RECORDS_URL)
        .token_service_url(TOKEN_URL)
        .fetch_retry(RetryPolicy::linear(3, Duration::from_millis(1)))
        .poll_interval(Duration::from_millis(10))
        .http_client(Arc::new(ScriptedBackend { special }))
        .build()
        .unwrap();

    GachaSyncService::bootstrap(config).await.unwrap()
}

#[tokio::test]
async fn test_run_sync_now_stores_full_history_once() {
    let service = service(12).await;

    let report = service.run_sync_now("T").await.unwrap();
    assert_eq!(report.identity.role_id, "P1");
    assert_eq!(report.outcome.succeeded, 12);
    assert!(report.outcome.is_clean());

    let records = service.list_records("P1").await.unwrap();
    assert_eq!(records.len(), 12);
    let seqs: HashSet<&str> = records.iter().map(|r| r.seq_id.as_str()).collect();
    assert_eq!(seqs.len(), 12);
    let ids: HashSet<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 12);

    let again = service.run_sync_now("T").await.unwrap();
    assert_eq!(again.outcome.succeeded, 0);
    assert_eq!(service.list_records("P1").await.unwrap().len(), 12);

    let metrics = service.metrics();
    assert_eq!(metrics.syncs_completed, 2);
    assert_eq!(metrics.records_inserted, 12);
}

#[tokio::test]
async fn test_expired_token_fails_without_records() {
    let service = service(12).await;

    let err = service.run_sync_now("stale").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Sync(SyncError::IdentityResolution(_))
    ));
    assert!(service.list_records("P1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submitted_task_is_run_by_poller() {
    let service = service(7).await;
    let poller = service.start_poller();

    let task_id = service.submit_sync("T").await.unwrap();

    let mut waited = Duration::ZERO;
    while service.task_status(task_id.as_str()).await.unwrap() != TaskStatus::Completed
        && waited < Duration::from_secs(5)
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    poller.shutdown().await.unwrap();

    let snapshot = service.poll_task(task_id.as_str()).await.unwrap();
    assert_eq!(snapshot.role_id.as_deref(), Some("P1"));
    assert_eq!(snapshot.profile.unwrap().nick_name, "Endmin");

    let records = service.list_records_for_task(task_id.as_str()).await.unwrap();
    assert_eq!(records.len(), 7);
}

#[tokio::test]
async fn test_poll_unknown_and_pending_tasks() {
    let service = service(7).await;

    assert!(matches!(
        service.poll_task("task42").await,
        Err(CoreError::Sync(SyncError::TaskNotFound { .. }))
    ));

    let task_id = service.submit_sync("T").await.unwrap();
    assert_eq!(
        service.task_status(task_id.as_str()).await.unwrap(),
        TaskStatus::Created
    );
    assert!(matches!(
        service.list_records_for_task(task_id.as_str()).await,
        Err(CoreError::Sync(SyncError::TaskNotCompleted { .. }))
    ));

    assert_eq!(service.poll_once().await.unwrap(), Some(task_id.clone()));
    assert_eq!(service.list_records_for_task(task_id.as_str()).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() {
    let mut config = CoreConfig::builder()
        .in_memory_database()
        .http_client(Arc::new(ScriptedBackend { special: 0 }))
        .build()
        .unwrap();
    config.node_id = 9;

    assert!(matches!(
        GachaSyncService::bootstrap(config).await,
        Err(CoreError::Runtime(_))
    ));
}
