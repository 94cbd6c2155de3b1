use crate::hn::client::{FetchError, HnClient};
use crate::hn::item::RawItem;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

/// Replies tried per story before giving up on a top comment.
const MAX_COMMENT_CANDIDATES: usize = 3;

/// An item whose details could not be fetched.
#[derive(Debug)]
pub struct ItemFailure {
    pub id: u64,
    pub error: FetchError,
}

/// Outcome of a batch of item fetches.
///
/// Both vectors follow the order of the ids passed to [`fetch_items`],
/// never the order in which fetches completed.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub items: Vec<RawItem>,
    pub failures: Vec<ItemFailure>,
}

/// Fetches item details for `ids` with bounded concurrency.
///
/// # Arguments
///
/// * `client` - API client shared by all fetch tasks
/// * `ids` - Candidate ids in ranking order
/// * `concurrency` - Maximum number of in-flight fetches (at least 1 is used)
/// * `deadline_at` - End of the run budget shared with the other fetch phases
///
/// # Behavior
///
/// - Individual failures are non-fatal and end up in [`FetchReport::failures`]
/// - Fetches still running (or still queued) when the deadline passes are
///   abandoned and reported as [`FetchError::DeadlineExceeded`]
/// - Duplicate ids are fetched once; later occurrences are dropped
/// - Results are keyed by id and re-projected into input order
pub async fn fetch_items(
    client: &HnClient,
    ids: &[u64],
    concurrency: usize,
    deadline_at: Instant,
) -> FetchReport {
    if ids.is_empty() {
        return FetchReport::default();
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let unique: Vec<u64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if unique.len() < ids.len() {
        tracing::warn!(
            duplicates = ids.len() - unique.len(),
            "Candidate list contains duplicate ids, fetching each once"
        );
    }

    let total = unique.len();
    let completed = AtomicUsize::new(0);

    let mut results: HashMap<u64, Result<RawItem, FetchError>> =
        stream::iter(unique.iter().copied())
            .map(|id| {
                let completed = &completed;
                async move {
                    let result = match tokio::time::timeout_at(deadline_at, client.fetch_item(id))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::DeadlineExceeded),
                    };

                    let done = completed.fetch_add(1, Ordering::Relaxed).saturating_add(1);
                    tracing::debug!(
                        id = id,
                        done = done,
                        total = total,
                        ok = result.is_ok(),
                        "Item fetch finished"
                    );

                    (id, result)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut report = FetchReport::default();
    for id in unique {
        match results.remove(&id) {
            Some(Ok(item)) => report.items.push(item),
            Some(Err(error)) => {
                tracing::warn!(id = id, error = %error, "Skipping item, details unavailable");
                report.failures.push(ItemFailure { id, error });
            }
            None => {}
        }
    }

    report
}

/// Fetches the first live reply of each story, keyed by story id.
///
/// Replies are tried in upstream order, skipping deleted, dead or empty
/// ones, up to `MAX_COMMENT_CANDIDATES` per story. Any fetch error or the
/// deadline ends the search for that story; the story simply gets no
/// quoted comment.
pub async fn fetch_top_comments(
    client: &HnClient,
    stories: &[RawItem],
    concurrency: usize,
    deadline_at: Instant,
) -> HashMap<u64, String> {
    let with_replies: Vec<&RawItem> = stories.iter().filter(|s| !s.kids.is_empty()).collect();
    if with_replies.is_empty() {
        return HashMap::new();
    }

    let comments: HashMap<u64, String> = stream::iter(with_replies)
        .map(|story| async move {
            let comment = tokio::time::timeout_at(deadline_at, first_live_reply(client, story))
                .await
                .unwrap_or_else(|_| {
                    tracing::debug!(id = story.id, "Run deadline reached before top comment");
                    None
                });
            (story.id, comment)
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(id, comment)| async move { comment.map(|c| (id, c)) })
        .collect()
        .await;

    tracing::debug!(
        stories = stories.len(),
        comments = comments.len(),
        "Top comments fetched"
    );
    comments
}

async fn first_live_reply(client: &HnClient, story: &RawItem) -> Option<String> {
    for &kid in story.kids.iter().take(MAX_COMMENT_CANDIDATES) {
        match client.fetch_item(kid).await {
            Ok(reply) if reply.deleted || reply.dead => continue,
            Ok(reply) => match reply.text {
                Some(text) if !text.trim().is_empty() => return Some(text),
                _ => continue,
            },
            Err(e) => {
                tracing::warn!(
                    id = story.id,
                    comment = kid,
                    error = %e,
                    "Top comment unavailable"
                );
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn story_json(id: u64) -> String {
        format!(
            r#"{{"id": {id}, "type": "story", "title": "Story {id}", "by": "pg", "time": 1700000000, "score": 10}}"#
        )
    }

    async fn mount_story(server: &MockServer, id: u64, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(story_json(id))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    fn within(budget: Duration) -> Instant {
        Instant::now() + budget
    }

    fn test_client(server: &MockServer) -> HnClient {
        let config = Config {
            api_base: server.uri(),
            retry_backoff_ms: 1,
            request_timeout_secs: 5,
            ..Config::default()
        };
        HnClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_results_follow_input_order_not_completion_order() {
        let mock_server = MockServer::start().await;
        // Earlier ids respond slower, so completion order is reversed
        mount_story(&mock_server, 1, Duration::from_millis(300)).await;
        mount_story(&mock_server, 2, Duration::from_millis(150)).await;
        mount_story(&mock_server, 3, Duration::ZERO).await;

        let client = test_client(&mock_server);
        let report = fetch_items(&client, &[1, 2, 3], 3, within(Duration::from_secs(10))).await;

        let ids: Vec<u64> = report.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_fatal() {
        let mock_server = MockServer::start().await;
        mount_story(&mock_server, 1, Duration::ZERO).await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/3.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;
        mount_story(&mock_server, 4, Duration::ZERO).await;

        let client = test_client(&mock_server);
        let report = fetch_items(&client, &[1, 2, 3, 4], 2, within(Duration::from_secs(10))).await;

        let ids: Vec<u64> = report.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 4]);

        let failed: Vec<u64> = report.failures.iter().map(|f| f.id).collect();
        assert_eq!(failed, vec![2, 3]);
        assert!(matches!(
            report.failures[0].error,
            FetchError::HttpStatus(500)
        ));
        assert!(matches!(report.failures[1].error, FetchError::Missing(3)));
    }

    #[tokio::test]
    async fn test_deadline_abandons_slow_fetches() {
        let mock_server = MockServer::start().await;
        mount_story(&mock_server, 1, Duration::ZERO).await;
        mount_story(&mock_server, 2, Duration::from_secs(3)).await;

        let client = test_client(&mock_server);
        let report = fetch_items(&client, &[1, 2], 2, within(Duration::from_millis(500))).await;

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].id, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, 2);
        assert!(matches!(
            report.failures[0].error,
            FetchError::DeadlineExceeded
        ));
    }

    #[tokio::test]
    async fn test_duplicate_ids_fetched_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/5.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(story_json(5)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let report = fetch_items(&client, &[5, 5, 5], 4, within(Duration::from_secs(10))).await;
        assert_eq!(report.items.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_ids_make_no_requests() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let report = fetch_items(&client, &[], 4, within(Duration::from_secs(10))).await;
        assert!(report.items.is_empty());
        assert!(report.failures.is_empty());
    }

    fn story_with_kids(id: u64, kids: &[u64]) -> RawItem {
        RawItem {
            id,
            item_type: Some("story".to_string()),
            kids: kids.to_vec(),
            ..RawItem::default()
        }
    }

    async fn mount_json(server: &MockServer, id: u64, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_top_comment_is_first_live_reply() {
        let mock_server = MockServer::start().await;
        mount_json(&mock_server, 101, r#"{"id": 101, "type": "comment", "deleted": true}"#).await;
        mount_json(
            &mock_server,
            102,
            r#"{"id": 102, "type": "comment", "by": "x", "text": "First!"}"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/item/103.json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let stories = vec![story_with_kids(1, &[101, 102, 103]), story_with_kids(2, &[])];
        let comments =
            fetch_top_comments(&client, &stories, 4, within(Duration::from_secs(10))).await;

        assert_eq!(comments.len(), 1);
        assert_eq!(comments.get(&1).map(String::as_str), Some("First!"));
    }

    #[tokio::test]
    async fn test_top_comment_failure_is_not_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/201.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        mount_json(&mock_server, 301, r#"{"id": 301, "type": "comment", "text": "ok"}"#).await;

        let client = test_client(&mock_server);
        let stories = vec![story_with_kids(2, &[201]), story_with_kids(3, &[301])];
        let comments =
            fetch_top_comments(&client, &stories, 2, within(Duration::from_secs(10))).await;

        assert!(!comments.contains_key(&2));
        assert_eq!(comments.get(&3).map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn test_top_comment_respects_deadline() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item/401.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"id": 401, "type": "comment", "text": "late"}"#)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let stories = vec![story_with_kids(4, &[401])];
        let comments =
            fetch_top_comments(&client, &stories, 1, within(Duration::from_millis(300))).await;

        assert!(comments.is_empty());
    }
}
