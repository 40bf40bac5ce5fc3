//! Endfield record API connector
//!
//! Implements the `RecordSource` trait for the character gacha record API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::records::{PoolType, RecordPage, RecordSource, RemotePullRecord};
use core_runtime::config::EndfieldApiConfig;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::EndfieldError;
use crate::token::escape_token_once;
use crate::types::{RecordItem, RecordResponse};

/// Longest error body kept in an `ApiError` message
const MAX_ERROR_BODY: usize = 256;

/// Endfield record API connector
///
/// # Features
///
/// - One GET per attempt, retried with the configured backoff on transport
///   errors, non-2xx statuses and unparseable bodies
/// - Responses without data end the pool's history without spending retries
/// - Capability token escaped exactly once
///
/// # Example
///
/// ```ignore
/// use provider_endfield::EndfieldConnector;
/// use bridge_traits::records::{PoolType, RecordSource};
///
/// let connector = EndfieldConnector::new(http_client, api_config, retry_policy);
/// let page = connector.fetch_page(&u8_token, PoolType::Special, None).await?;
/// ```
pub struct EndfieldConnector {
    http_client: Arc<dyn HttpClient>,
    api: EndfieldApiConfig,
    retry: RetryPolicy,
}

impl EndfieldConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api: EndfieldApiConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http_client,
            api,
            retry,
        }
    }

    /// Build the page URL. The token is the only value that needs escaping.
    fn page_url(&self, capability_token: &str, pool_type: PoolType, cursor: Option<u64>) -> String {
        let mut url = format!(
            "{}?lang={}&pool_type={}&token={}&server_id={}",
            self.api.records_api_url,
            urlencoding::encode(&self.api.lang),
            pool_type.wire_name(),
            escape_token_once(capability_token),
            urlencoding::encode(&self.api.server_id),
        );

        if let Some(seq_id) = cursor {
            url.push_str(&format!("&seq_id={}", seq_id));
        }

        url
    }

    fn convert_item(item: RecordItem) -> RemotePullRecord {
        RemotePullRecord {
            pool_id: item.pool_id,
            pool_name: item.pool_name,
            char_id: item.char_id,
            char_name: item.char_name,
            rarity: item.rarity,
            is_free: item.is_free,
            is_new: item.is_new,
            gacha_ts: item.gacha_ts,
            seq_id: item.seq_id,
        }
    }

    fn convert_response(&self, response: RecordResponse, pool_type: PoolType) -> RecordPage {
        let end = || RecordPage::end(pool_type, self.api.lang.clone(), self.api.server_id.clone());

        if response.code != Some(0) {
            debug!(
                code = ?response.code,
                msg = response.msg.as_deref().unwrap_or(""),
                "Record API returned no data"
            );
            return end();
        }

        let Some(data) = response.data else {
            return end();
        };

        let records: Vec<RemotePullRecord> = data
            .list
            .unwrap_or_default()
            .into_iter()
            .map(Self::convert_item)
            .collect();

        if records.is_empty() {
            return end();
        }

        RecordPage {
            pool_type,
            lang: self.api.lang.clone(),
            server_id: self.api.server_id.clone(),
            records,
            has_more: data.has_more,
        }
    }

    /// Single attempt: request, status check, parse.
    async fn request_page(&self, url: &str, pool_type: PoolType) -> crate::Result<RecordPage> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .timeout(self.api.request_timeout);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let mut message = String::from_utf8_lossy(&response.body).into_owned();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| message.is_char_boundary(*i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(EndfieldError::ApiError {
                status_code: response.status,
                message,
            });
        }

        let parsed: RecordResponse = serde_json::from_slice(&response.body).map_err(|e| {
            EndfieldError::ParseError(format!("Failed to parse record page: {}", e))
        })?;

        Ok(self.convert_response(parsed, pool_type))
    }
}

#[async_trait]
impl RecordSource for EndfieldConnector {
    #[instrument(skip(self, capability_token), fields(pool_type = %pool_type, cursor = ?cursor))]
    async fn fetch_page(
        &self,
        capability_token: &str,
        pool_type: PoolType,
        cursor: Option<u64>,
    ) -> Result<RecordPage> {
        let url = self.page_url(capability_token, pool_type, cursor);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.request_page(&url, pool_type).await {
                Ok(page) => {
                    debug!(
                        records = page.records.len(),
                        has_more = page.has_more,
                        attempt,
                        "Fetched record page"
                    );
                    return Ok(page);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Record page request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, attempts = attempt, "Record page request failed");
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn page_body(seqs: &[u64], has_more: bool) -> String {
        let list: Vec<String> = seqs
            .iter()
            .map(|seq| {
                format!(
                    r#"{{"poolId":"special_1","poolName":"Pool A","charId":"chr_{seq}","charName":"Op {seq}","rarity":4,"isFree":false,"isNew":false,"gachaTs":"17000000{seq}","seqId":"{seq}"}}"#
                )
            })
            .collect();
        format!(
            r#"{{"code":0,"msg":"","data":{{"list":[{}],"hasMore":{}}}}}"#,
            list.join(","),
            has_more
        )
    }

    fn connector(mock: MockHttpClient) -> EndfieldConnector {
        EndfieldConnector::new(
            Arc::new(mock),
            EndfieldApiConfig {
                records_api_url: "https://records.test/api/record/char".to_string(),
                ..EndfieldApiConfig::default()
            },
            RetryPolicy::linear(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_fetch_page_builds_query_and_parses() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| {
                request.url
                    == "https://records.test/api/record/char?lang=zh-cn\
                        &pool_type=E_CharacterGachaPoolType_Special\
                        &token=a%2Bb&server_id=1&seq_id=692"
            })
            .returning(|_| Ok(response(200, &page_body(&[691, 690, 689], true))));

        let page = connector(mock_http)
            .fetch_page("a+b", PoolType::Special, Some(692))
            .await
            .unwrap();

        assert_eq!(page.pool_type, PoolType::Special);
        assert_eq!(page.records.len(), 3);
        assert_eq!(page.oldest_seq_id(), Some("689"));
        assert!(page.has_more);
        assert_eq!(page.lang, "zh-cn");
    }

    #[tokio::test]
    async fn test_first_page_has_no_cursor() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| !request.url.contains("seq_id"))
            .returning(|_| Ok(response(200, &page_body(&[5], false))));

        let page = connector(mock_http)
            .fetch_page("tok", PoolType::Beginner, None)
            .await
            .unwrap();

        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_already_escaped_token_not_double_encoded() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| {
                request.url.contains("&token=a%2Bb&") && !request.url.contains("%252B")
            })
            .returning(|_| Ok(response(200, &page_body(&[1], false))));

        connector(mock_http)
            .fetch_page("a%2Bb", PoolType::Special, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_code_is_end_of_history_without_retry() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"code":10001,"msg":"token invalid"}"#)));

        let page = connector(mock_http)
            .fetch_page("tok", PoolType::Standard, Some(10))
            .await
            .unwrap();

        assert!(page.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_empty_list_is_end_of_history() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"code":0,"data":{"list":[],"hasMore":true}}"#)));

        let page = connector(mock_http)
            .fetch_page("tok", PoolType::Standard, None)
            .await
            .unwrap();

        assert!(page.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BridgeError::OperationFailed("connection reset".to_string()))
            } else {
                Ok(response(200, &page_body(&[3, 2, 1], false)))
            }
        });

        let page = connector(mock_http)
            .fetch_page("tok", PoolType::Special, None)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(page.records.len(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(3)
            .returning(|_| Ok(response(503, "unavailable")));

        let err = connector(mock_http)
            .fetch_page("tok", PoolType::Special, Some(40))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(3)
            .returning(|_| Ok(response(200, "<html>gateway</html>")));

        let err = connector(mock_http)
            .fetch_page("tok", PoolType::Special, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Parse error"));
    }
}
