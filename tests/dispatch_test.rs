//! 通知分发测试
//!
//! 使用记录调用的消息通道验证分发顺序、失败隔离和限流

use async_trait::async_trait;
use scrape_notify::config::{AlbumMode, DispatchConfig};
use scrape_notify::error::{RegistryError, ScrapeNotifyError, TransportError};
use scrape_notify::notification::{
    AlbumItem, Dispatcher, FilterDescriptor, MessageTransport, NotificationBatch, PhotoOptions,
    RateLimiter, RecipientId, RecipientRegistry, ResultField, ResultItem, ResultStatus,
    StaticRecipientRegistry, TextOptions,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Text,
    Photo,
    Album(usize),
}

#[derive(Debug, Clone)]
struct Call {
    recipient: String,
    kind: Kind,
    payload: String,
}

/// 记录调用的消息通道
#[derive(Default)]
struct MockTransport {
    calls: Mutex<Vec<Call>>,
    fail_photo: bool,
    fail_text_for: Option<String>,
}

impl MockTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, recipient: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.recipient == recipient)
            .collect()
    }

    fn record(&self, recipient: &RecipientId, kind: Kind, payload: &str) {
        self.calls.lock().unwrap().push(Call {
            recipient: recipient.to_string(),
            kind,
            payload: payload.to_string(),
        });
    }
}

fn rejected(method: &str) -> TransportError {
    TransportError::Api {
        method: method.to_string(),
        code: 400,
        description: "Bad Request: wrong file identifier".to_string(),
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send_text(
        &self,
        recipient: &RecipientId,
        text: &str,
        options: TextOptions,
    ) -> Result<(), TransportError> {
        assert!(options.rich_markup);
        assert!(options.suppress_link_preview);
        self.record(recipient, Kind::Text, text);
        if self.fail_text_for.as_deref() == Some(recipient.as_str()) {
            return Err(rejected("sendMessage"));
        }
        Ok(())
    }

    async fn send_photo(
        &self,
        recipient: &RecipientId,
        image_url: &str,
        options: &PhotoOptions,
    ) -> Result<(), TransportError> {
        assert!(options.rich_markup);
        self.record(recipient, Kind::Photo, image_url);
        if self.fail_photo {
            return Err(rejected("sendPhoto"));
        }
        Ok(())
    }

    async fn send_album(
        &self,
        recipient: &RecipientId,
        items: &[AlbumItem],
    ) -> Result<(), TransportError> {
        self.record(recipient, Kind::Album(items.len()), "");
        Ok(())
    }
}

struct UnavailableRegistry;

#[async_trait]
impl RecipientRegistry for UnavailableRegistry {
    async fn list_active_recipients(&self) -> Result<Vec<RecipientId>, RegistryError> {
        Err(RegistryError::Unavailable("redis down".to_string()))
    }

    async fn activate(&self, _recipient: &RecipientId) -> Result<bool, RegistryError> {
        Err(RegistryError::Unavailable("redis down".to_string()))
    }
}

fn item(endpoint: &str, status: ResultStatus, id: &str, image: bool) -> ResultItem {
    ResultItem {
        unique_hash: id.to_string(),
        endpoint_name: endpoint.to_string(),
        url: format!("https://example.com/{id}"),
        fields: vec![ResultField {
            field_name: "title".to_string(),
            value: json!(format!("Item {id}")),
        }],
        status,
        image_url: image.then(|| format!("https://img.example.com/{id}.jpg")),
    }
}

fn batch(results: Vec<ResultItem>) -> NotificationBatch {
    NotificationBatch {
        results,
        filters: vec![FilterDescriptor {
            field_name: "price".to_string(),
            operator: "<".to_string(),
            value: json!(50),
        }],
        group_name: "Deals".to_string(),
    }
}

fn dispatcher(
    recipients: &[&str],
    transport: Arc<MockTransport>,
    config: DispatchConfig,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(StaticRecipientRegistry::new(recipients.iter().copied())),
        transport,
        Arc::new(RateLimiter::new(1000, Duration::from_millis(1000))),
        &config,
    )
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = dispatcher(&["1", "2"], transport.clone(), DispatchConfig::default());

    let summary = dispatcher.dispatch(&batch(Vec::new())).await.unwrap();

    assert_eq!(summary.recipients, 2);
    assert_eq!(summary.chunks, 0);
    assert_eq!(summary.report.send_calls, 0);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_empty_batch_still_reports_registry_failure() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = Dispatcher::new(
        Arc::new(UnavailableRegistry),
        transport.clone(),
        Arc::new(RateLimiter::default()),
        &DispatchConfig::default(),
    );

    let result = dispatcher.dispatch(&batch(Vec::new())).await;

    assert!(matches!(result, Err(ScrapeNotifyError::Registry(_))));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_dispatch_runs_on_spawned_task() {
    let transport = Arc::new(MockTransport::default());
    let config = DispatchConfig {
        max_concurrent_recipients: 2,
        ..Default::default()
    };
    let dispatcher = Arc::new(dispatcher(&["1", "2"], transport.clone(), config));
    let results = vec![
        item("A", ResultStatus::New, "a1", true),
        item("B", ResultStatus::Updated, "b1", false),
    ];

    // tokio::spawn 要求分发 future 是 Send
    let handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch(&batch(results)).await }
    });
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.recipients, 2);
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test]
async fn test_no_recipients_sends_nothing() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = dispatcher(&[], transport.clone(), DispatchConfig::default());

    let summary = dispatcher
        .dispatch(&batch(vec![item("A", ResultStatus::New, "1", false)]))
        .await
        .unwrap();

    assert_eq!(summary.recipients, 0);
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_per_recipient_order() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = dispatcher(&["1", "2"], transport.clone(), DispatchConfig::default());

    let results = vec![
        item("A", ResultStatus::New, "a-text", false),
        item("A", ResultStatus::New, "a-img", true),
        item("B", ResultStatus::New, "b-text", false),
        item("A", ResultStatus::Updated, "a-upd", true),
    ];
    let summary = dispatcher.dispatch(&batch(results)).await.unwrap();
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.recipients, 2);

    let calls = transport.calls();
    assert_eq!(calls.len(), 8);

    // 逐个用户发送：用户 1 的消息全部在用户 2 之前
    assert!(calls[..4].iter().all(|call| call.recipient == "1"));
    assert!(calls[4..].iter().all(|call| call.recipient == "2"));

    let first = &calls[..4];
    assert_eq!(first[0].kind, Kind::Photo);
    assert_eq!(first[0].payload, "https://img.example.com/a-img.jpg");
    assert_eq!(first[1].kind, Kind::Text);
    assert!(first[1].payload.contains("Results for endpoint: A"));
    assert!(first[1].payload.contains("<b>New results:</b>"));
    assert!(first[1].payload.contains("GROUP: Deals\nFilters: price &lt; 50\n"));
    assert_eq!(first[2].kind, Kind::Photo);
    assert_eq!(first[2].payload, "https://img.example.com/a-upd.jpg");
    assert_eq!(first[3].kind, Kind::Text);
    assert!(first[3].payload.contains("Results for endpoint: B"));
}

#[tokio::test]
async fn test_photo_failures_fall_back_for_every_item() {
    let transport = Arc::new(MockTransport {
        fail_photo: true,
        ..Default::default()
    });
    let dispatcher = dispatcher(&["1", "2"], transport.clone(), DispatchConfig::default());

    let results = (0..3)
        .map(|i| item("A", ResultStatus::New, &format!("p{i}"), true))
        .collect();
    let summary = dispatcher.dispatch(&batch(results)).await.unwrap();

    assert_eq!(summary.report.attempted_items, 6);
    assert_eq!(summary.report.fallback_delivered, 6);
    assert_eq!(summary.report.abandoned, 0);

    for recipient in ["1", "2"] {
        let kinds: Vec<Kind> = transport
            .calls_for(recipient)
            .into_iter()
            .map(|call| call.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Photo,
                Kind::Text,
                Kind::Photo,
                Kind::Text,
                Kind::Photo,
                Kind::Text
            ]
        );
    }
}

#[tokio::test]
async fn test_one_recipient_failing_does_not_affect_others() {
    let transport = Arc::new(MockTransport {
        fail_text_for: Some("2".to_string()),
        ..Default::default()
    });
    let dispatcher = dispatcher(&["1", "2", "3"], transport.clone(), DispatchConfig::default());

    let results = vec![
        item("A", ResultStatus::New, "x", false),
        item("B", ResultStatus::Updated, "y", false),
    ];
    let summary = dispatcher.dispatch(&batch(results)).await.unwrap();

    assert_eq!(transport.calls_for("1").len(), 2);
    assert_eq!(transport.calls_for("2").len(), 2);
    assert_eq!(transport.calls_for("3").len(), 2);
    assert_eq!(summary.report.text_delivered, 4);
    assert_eq!(summary.report.abandoned, 2);
}

#[tokio::test]
async fn test_grouped_albums_split_at_ten() {
    let transport = Arc::new(MockTransport::default());
    let config = DispatchConfig {
        album_mode: AlbumMode::Grouped,
        ..Default::default()
    };
    let dispatcher = dispatcher(&["1"], transport.clone(), config);

    let results = (0..23)
        .map(|i| item("A", ResultStatus::New, &format!("p{i}"), true))
        .collect();
    let summary = dispatcher.dispatch(&batch(results)).await.unwrap();

    let kinds: Vec<Kind> = transport.calls().into_iter().map(|call| call.kind).collect();
    assert_eq!(kinds, vec![Kind::Album(10), Kind::Album(10), Kind::Album(3)]);
    assert_eq!(summary.report.rich_delivered, 23);
}

#[tokio::test]
async fn test_registry_failure_aborts_before_sending() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = Dispatcher::new(
        Arc::new(UnavailableRegistry),
        transport.clone(),
        Arc::new(RateLimiter::default()),
        &DispatchConfig::default(),
    );

    let result = dispatcher
        .dispatch(&batch(vec![item("A", ResultStatus::New, "1", false)]))
        .await;

    assert!(matches!(result, Err(ScrapeNotifyError::Registry(_))));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_recipients_keep_their_own_order() {
    let transport = Arc::new(MockTransport::default());
    let config = DispatchConfig {
        max_concurrent_recipients: 4,
        ..Default::default()
    };
    let recipients = ["1", "2", "3", "4", "5"];
    let dispatcher = dispatcher(&recipients, transport.clone(), config);

    let results = vec![
        item("A", ResultStatus::New, "a1", true),
        item("A", ResultStatus::New, "a2", false),
        item("B", ResultStatus::New, "b1", false),
    ];
    let summary = dispatcher.dispatch(&batch(results)).await.unwrap();
    assert_eq!(summary.recipients, 5);

    for recipient in recipients {
        let calls = transport.calls_for(recipient);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].kind, Kind::Photo);
        assert!(calls[1].payload.contains("Results for endpoint: A"));
        assert!(calls[2].payload.contains("Results for endpoint: B"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_is_rate_limited() {
    let transport = Arc::new(MockTransport::default());
    let dispatcher = Dispatcher::new(
        Arc::new(StaticRecipientRegistry::new(["1", "2", "3"])),
        transport.clone(),
        Arc::new(RateLimiter::new(2, Duration::from_millis(1000))),
        &DispatchConfig::default(),
    );

    let start = tokio::time::Instant::now();
    dispatcher
        .dispatch(&batch(vec![item("A", ResultStatus::New, "1", false)]))
        .await
        .unwrap();

    // 3 次发送，每秒最多 2 次
    assert_eq!(transport.calls().len(), 3);
    assert!(tokio::time::Instant::now() - start >= Duration::from_millis(1000));
}
