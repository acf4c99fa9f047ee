// src/pipeline/poll.rs

//! Change detection pass.
//!
//! One pass walks the watch list in order and, for each URL:
//! 1. skips it locally if it is not a valid target URL
//! 2. classifies the page
//! 3. compares against the stored record (missing or unreadable: `FULL`)
//! 4. on change, records the new state and then notifies
//!
//! URLs are handled one at a time; a failure affects only its own URL.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use reqwest::Client;

use crate::error::Result;
use crate::models::{
    Config, DispatchOutcome, PassSummary, SeatState, StateRecord, TargetConfig, UrlOutcome,
};
use crate::services::{Notifier, PageClassifier};
use crate::storage::{BlobStore, RecordLookup, StateStore};
use crate::utils::http::create_async_client;
use crate::utils::now_in;
use crate::utils::url::is_valid_target_url;

/// Drives polling passes over the watch list.
pub struct Watcher {
    store: StateStore,
    classifier: PageClassifier,
    notifier: Notifier,
    target: TargetConfig,
    offset: FixedOffset,
    request_delay: Duration,
}

impl Watcher {
    /// Build a watcher over `blobs` with a fresh HTTP client.
    pub fn new(config: &Config, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        let client = create_async_client(&config.watcher)?;
        let store = StateStore::new(blobs, &config.storage);
        Ok(Self::from_parts(config, store, client))
    }

    /// Build a watcher from an existing store and client.
    pub fn from_parts(config: &Config, store: StateStore, client: Client) -> Self {
        Self {
            store,
            classifier: PageClassifier::with_client(client.clone(), config),
            notifier: Notifier::new(client, config.notifier.clone()),
            target: config.target.clone(),
            offset: config.notifier.offset(),
            request_delay: Duration::from_millis(config.watcher.request_delay_ms),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one full pass.
    ///
    /// The only error is a failed watch-list read; nothing has been touched
    /// at that point. Every per-URL failure is folded into the summary.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let Some(urls) = self.store.load_watch_list().await? else {
            log::warn!(
                "Watch list not found at {}",
                self.store.blobs().location(self.store.watch_list_key())
            );
            return Ok(PassSummary::default());
        };

        if urls.is_empty() {
            log::warn!("Watch list {} has no URLs", self.store.watch_list_key());
            return Ok(PassSummary::default());
        }

        log::info!("Processing {} URLs", urls.len());

        let mut summary = PassSummary {
            total: urls.len(),
            ..PassSummary::default()
        };

        for (index, url) in urls.iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            let outcome = self.process_url(url).await;
            summary.record(url, outcome);
        }

        log::info!(
            "Pass completed: {} processed, {} errored ({} invalid), {} changed of {} URLs",
            summary.processed,
            summary.errored,
            summary.invalid,
            summary.changed,
            summary.total
        );

        Ok(summary)
    }

    async fn process_url(&self, url: &str) -> UrlOutcome {
        if !is_valid_target_url(url, &self.target) {
            log::warn!("Skipping invalid URL {}", url);
            return UrlOutcome::Invalid;
        }

        let current = match self.classifier.classify(url).await {
            Ok(availability) => availability,
            Err(e) => {
                log::error!("Failed to classify {}: {}", url, e);
                return UrlOutcome::FetchFailed {
                    message: e.to_string(),
                };
            }
        };
        log::info!("Checked {}: {}", url, current);

        let lookup = self.store.read_record(url).await;
        match &lookup {
            RecordLookup::Corrupted(reason) => log::warn!(
                "Stored state for {} at {} is corrupted, assuming previous state: {}",
                url,
                self.store.state_key(url),
                reason
            ),
            RecordLookup::Unreadable(e) => log::warn!(
                "Failed to read previous state for {} at {}: {}",
                url,
                self.store.state_key(url),
                e
            ),
            RecordLookup::Untimed { state, reason } => log::warn!(
                "Stored state for {} has an unreadable TIME, comparing against {}: {}",
                url,
                state,
                reason
            ),
            RecordLookup::Missing | RecordLookup::Found(_) => {}
        }

        let previous = lookup.previous_state();
        let current_state = SeatState::from(current);
        if current_state == previous {
            log::info!("No state change for {} ({})", url, current_state);
            return UrlOutcome::Unchanged {
                state: current_state,
            };
        }

        let record = StateRecord::new(current, now_in(self.offset));
        if let Err(e) = self.store.write_record(url, &record).await {
            log::error!(
                "Failed to save state {} for {} to {}: {}",
                current_state,
                url,
                self.store.state_key(url),
                e
            );
            return UrlOutcome::PersistFailed {
                previous,
                current: current_state,
                message: e.to_string(),
            };
        }
        log::info!(
            "Saved new state for {}: {} -> {} at {}",
            url,
            previous,
            current_state,
            record.observed_at.to_rfc3339()
        );

        let notification = match self.notifier.dispatch(url, current).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Failed to send notification for {}: {}", url, e);
                DispatchOutcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        UrlOutcome::changed(previous, current, notification)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::models::Availability;
    use crate::storage::MemoryStorage;

    const FULL_PAGE: &str = "<div><span>This beta is full.</span></div>";
    const OPEN_PAGE: &str = "<div><a class=\"accept\">Accept</a></div>";

    struct Harness {
        server: MockServer,
        memory: Arc<MemoryStorage>,
        watcher: Watcher,
    }

    impl Harness {
        async fn new(with_webhook: bool) -> Self {
            let server = MockServer::start().await;
            let mut config = Config::default();
            config.target.scheme = "http".to_string();
            config.target.host = "127.0.0.1".to_string();
            if with_webhook {
                config.notifier.webhook_url = Some(format!("{}/hook", server.uri()));
            }

            let memory = Arc::new(MemoryStorage::new());
            let watcher = Watcher::new(&config, memory.clone()).unwrap();
            Self {
                server,
                memory,
                watcher,
            }
        }

        fn url(&self, app: &str) -> String {
            format!("{}/join/{app}", self.server.uri())
        }

        fn watch<S: AsRef<str>>(&self, lines: &[S]) {
            let text: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
            self.memory.insert("urls.txt", text.join("\n"));
        }

        async fn serve(&self, app: &str, status: u16, body: &str) {
            Mock::given(method("GET"))
                .and(path(format!("/join/{app}")))
                .respond_with(ResponseTemplate::new(status).set_body_string(body))
                .mount(&self.server)
                .await;
        }

        async fn accept_webhook(&self, status: u16) {
            Mock::given(method("POST"))
                .and(path("/hook"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        }

        async fn requests_to(&self, prefix: &str) -> Vec<Request> {
            self.server
                .received_requests()
                .await
                .unwrap()
                .into_iter()
                .filter(|r| r.url.path().starts_with(prefix))
                .collect()
        }

        fn stored_state(&self, url: &str) -> Option<serde_json::Value> {
            let key = self.watcher.store().state_key(url);
            self.memory
                .object(&key)
                .map(|o| serde_json::from_slice(&o.bytes).unwrap())
        }

        fn seed_record(&self, url: &str, state: Availability) {
            let record = StateRecord::new(
                state,
                DateTime::parse_from_rfc3339("2026-01-01T00:00:00+07:00").unwrap(),
            );
            self.memory.insert(
                self.watcher.store().state_key(url),
                serde_json::to_vec(&record).unwrap(),
            );
        }
    }

    #[tokio::test]
    async fn test_first_open_then_idempotent_second_pass() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.serve("app1", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let first = h.watcher.run_pass().await.unwrap();
        assert_eq!(first.changed, 1);
        assert_eq!(first.processed, 1);
        assert_eq!(h.memory.put_count(), 1);
        assert_eq!(h.stored_state(&url).unwrap()["STATE"], "OPEN");

        let hooks = h.requests_to("/hook").await;
        assert_eq!(hooks.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&hooks[0].body).unwrap();
        assert_eq!(body["embeds"][0]["title"], "TestFlight Available");
        assert_eq!(
            first.outcome_for(&url),
            Some(&UrlOutcome::Changed {
                previous: SeatState::Full,
                current: SeatState::Open,
                notification: DispatchOutcome::Sent { status: 204 },
            })
        );

        let second = h.watcher.run_pass().await.unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(second.processed, 1);
        assert_eq!(h.memory.put_count(), 1);
        assert_eq!(h.requests_to("/hook").await.len(), 1);
        assert_eq!(
            second.outcome_for(&url),
            Some(&UrlOutcome::Unchanged {
                state: SeatState::Open
            })
        );
    }

    #[tokio::test]
    async fn test_first_full_does_not_notify() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.serve("app1", 200, FULL_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 0);
        assert_eq!(h.memory.put_count(), 0);
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_open_to_full_notifies() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.seed_record(&url, Availability::Open);
        h.serve("app1", 200, FULL_PAGE).await;
        h.accept_webhook(200).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 1);
        assert_eq!(h.stored_state(&url).unwrap()["STATE"], "FULL");

        let hooks = h.requests_to("/hook").await;
        assert_eq!(hooks.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&hooks[0].body).unwrap();
        assert_eq!(body["embeds"][0]["title"], "TestFlight Full");
        assert!(body.get("components").is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_never_fetched_or_stored() {
        let h = Harness::new(true).await;
        let invalid = "https://example.com/join/nope";
        h.watch(&[invalid, "not a url"]);

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.errored, 2);
        assert_eq!(summary.outcome_for(invalid), Some(&UrlOutcome::Invalid));
        assert!(h.server.received_requests().await.unwrap().is_empty());
        assert_eq!(h.memory.keys(), vec!["urls.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupted_record_falls_back_to_full() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.memory
            .insert(h.watcher.store().state_key(&url), "{\"STATE\": ");
        h.serve("app1", 200, FULL_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(
            summary.outcome_for(&url),
            Some(&UrlOutcome::Unchanged {
                state: SeatState::Full
            })
        );
        assert_eq!(h.memory.put_count(), 0);
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_record_without_offset_keeps_open_state() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.memory.insert(
            h.watcher.store().state_key(&url),
            r#"{"STATE":"OPEN","TIME":"2025-11-02T14:00:12.345"}"#,
        );
        h.serve("app1", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(
            summary.outcome_for(&url),
            Some(&UrlOutcome::Unchanged {
                state: SeatState::Open
            })
        );
        assert_eq!(h.memory.put_count(), 0);
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_record_with_foreign_time_format_compares_state_only() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.memory.insert(
            h.watcher.store().state_key(&url),
            r#"{"STATE":"OPEN","TIME":"2/11/2025, 21:00:12"}"#,
        );
        h.serve("app1", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 0);
        assert_eq!(h.memory.put_count(), 0);
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_record_falls_back_to_full() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.memory.fail_reads(h.watcher.store().state_key(&url));
        h.serve("app1", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 1);
        assert_eq!(h.memory.put_count(), 1);
        assert_eq!(h.requests_to("/hook").await.len(), 1);
    }

    #[tokio::test]
    async fn test_without_webhook_state_is_still_persisted() {
        let h = Harness::new(false).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.serve("app1", 200, OPEN_PAGE).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.errored, 0);
        assert_eq!(h.stored_state(&url).unwrap()["STATE"], "OPEN");
        assert_eq!(
            summary.outcome_for(&url),
            Some(&UrlOutcome::Changed {
                previous: SeatState::Full,
                current: SeatState::Open,
                notification: DispatchOutcome::Skipped,
            })
        );
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let h = Harness::new(true).await;
        let broken = h.url("broken");
        let healthy = h.url("healthy");
        h.watch(&[&broken, &healthy]);
        h.serve("broken", 503, "maintenance").await;
        h.serve("healthy", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.changed, 1);
        assert!(matches!(
            summary.outcome_for(&broken),
            Some(UrlOutcome::FetchFailed { .. })
        ));
        assert!(h.stored_state(&broken).is_none());
        assert_eq!(h.stored_state(&healthy).unwrap()["STATE"], "OPEN");
    }

    #[tokio::test]
    async fn test_persist_failure_skips_notification() {
        let h = Harness::new(true).await;
        let url = h.url("app1");
        h.watch(&[&url]);
        h.memory.fail_writes(h.watcher.store().state_key(&url));
        h.serve("app1", 200, OPEN_PAGE).await;
        h.accept_webhook(204).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.changed, 0);
        assert!(matches!(
            summary.outcome_for(&url),
            Some(UrlOutcome::PersistFailed {
                previous: SeatState::Full,
                current: SeatState::Open,
                ..
            })
        ));
        assert!(h.requests_to("/hook").await.is_empty());
    }

    #[tokio::test]
    async fn test_webhook_failure_does_not_abort_pass() {
        let h = Harness::new(true).await;
        let first = h.url("first");
        let second = h.url("second");
        h.watch(&[&first, &second]);
        h.serve("first", 200, OPEN_PAGE).await;
        h.serve("second", 200, OPEN_PAGE).await;
        h.accept_webhook(500).await;

        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.changed, 2);
        assert_eq!(h.memory.put_count(), 2);
        assert!(matches!(
            summary.outcome_for(&first),
            Some(UrlOutcome::Changed {
                notification: DispatchOutcome::Rejected { status: 500, .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_or_empty_watch_list_does_nothing() {
        let h = Harness::new(true).await;
        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.reports.is_empty());

        h.watch(&["", "   "]);
        let summary = h.watcher.run_pass().await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(h.memory.put_count(), 0);
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_list_read_failure_aborts_pass() {
        let h = Harness::new(true).await;
        h.memory.fail_reads("urls.txt");
        assert!(h.watcher.run_pass().await.is_err());
        assert_eq!(h.memory.put_count(), 0);
    }
}
