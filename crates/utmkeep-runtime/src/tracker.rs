//! AttributionTracker: the service a host page holds.
//!
//! Stateless apart from its storage handles. The document is passed into
//! each call, so one tracker can serve any number of page renders.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};
use utmkeep_core::{AttributionRecord, PageContext, TrackerConfig, capture};
use utmkeep_dom::{FieldStatus, FormDocument, ReplayReport, Replayer, check_fields, clear_fields};
use utmkeep_storage::{CookieJar, KeyValueStore, RecordStore, SessionTagger, WriteOutcome};

use crate::clock::{Clock, SystemClock};

/// Result of the page-ready sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    /// The URL carried tracked parameters and replaced the stored record.
    pub captured: bool,
    /// Record replayed into the page, with session id merged.
    pub record: Option<AttributionRecord>,
    /// Where the final record write landed, if one was needed.
    pub write: Option<WriteOutcome>,
    pub replay: ReplayReport,
}

pub struct AttributionTracker<P, C, S> {
    config: TrackerConfig,
    records: RecordStore<P, C>,
    sessions: SessionTagger<S>,
    clock: Arc<dyn Clock>,
}

impl<P, C, S> AttributionTracker<P, C, S>
where
    P: KeyValueStore,
    C: CookieJar,
    S: KeyValueStore,
{
    /// `primary` and `session` are the local and session key-value stores;
    /// `fallback` receives the record when `primary` refuses it.
    pub fn new(config: TrackerConfig, primary: P, fallback: C, session: S) -> Self {
        let records = RecordStore::new(primary, fallback, &config);
        let sessions = SessionTagger::new(session, config.session_key.clone());
        Self {
            config,
            records,
            sessions,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore<P, C> {
        &self.records
    }

    pub fn sessions(&self) -> &SessionTagger<S> {
        &self.sessions
    }

    /// Page-ready sequence: capture from the URL, fall back to the stored
    /// record, merge the session id, then replay into every form.
    ///
    /// Replay uses the in-memory record, so the current page is populated
    /// even when no storage channel accepted the write.
    pub fn init<D: FormDocument + ?Sized>(&self, page: &PageContext, doc: &mut D) -> InitOutcome {
        let now = self.clock.now();
        debug!(url = %page.url, "attribution tracker starting");

        let captured = self.capture_and_store(page);
        let was_captured = captured.is_some();
        let mut write = captured.as_ref().map(|(_, outcome)| *outcome);
        let mut record = captured
            .map(|(record, _)| record)
            .or_else(|| self.records.read(now));

        if let Some(ref mut record) = record {
            let session_id = self.sessions.get_or_create(now);
            if record.set_session_id(session_id) {
                write = Some(self.records.write(record));
            }
        }

        let replay = Replayer::new(&self.config).replay_document(doc, record.as_ref());
        InitOutcome {
            captured: was_captured,
            record,
            write,
            replay,
        }
    }

    /// Capture tracked parameters from `page` and store them, replacing any
    /// existing record. Returns `None`, leaving storage untouched, when the
    /// URL has no tracked parameter.
    pub fn save_from_url(&self, page: &PageContext) -> Option<AttributionRecord> {
        self.capture_and_store(page).map(|(record, _)| record)
    }

    /// The stored, unexpired record.
    pub fn get_data(&self) -> Option<AttributionRecord> {
        self.records.read(self.clock.now())
    }

    /// Replay the stored record into every eligible form.
    pub fn fill_fields<D: FormDocument + ?Sized>(&self, doc: &mut D) -> ReplayReport {
        let record = self.get_data();
        Replayer::new(&self.config).replay_document(doc, record.as_ref())
    }

    /// Replay into the form with `form_id` only. `None` when there is no
    /// such form.
    pub fn attach_to_form<D: FormDocument + ?Sized>(
        &self,
        doc: &mut D,
        form_id: &str,
    ) -> Option<ReplayReport> {
        let Some(form) = doc.form_by_id(form_id) else {
            debug!(form_id, "attach target form not found");
            return None;
        };
        let replayer = Replayer::new(&self.config);
        let report = match self.get_data() {
            Some(record) => replayer.replay_form(doc, form, &record),
            None => ReplayReport::default(),
        };
        Some(report)
    }

    /// Blank every bound input. Returns how many inputs had a value.
    pub fn clear_fields<D: FormDocument + ?Sized>(&self, doc: &mut D) -> usize {
        clear_fields(doc, &self.config.bindings(), &self.config.opt_out_attr)
    }

    /// Fill status for every bound CSS class.
    pub fn check_fields<D: FormDocument + ?Sized>(&self, doc: &D) -> BTreeMap<String, FieldStatus> {
        let status = check_fields(doc, &self.config.bindings());
        let filled: usize = status.values().map(|s| s.filled).sum();
        debug!(classes = status.len(), filled, "attribution field status");
        status
    }

    /// Delete the stored record from every channel. The session id is kept.
    pub fn clear(&self) {
        self.records.clear();
        info!("attribution record cleared");
    }

    fn capture_and_store(&self, page: &PageContext) -> Option<(AttributionRecord, WriteOutcome)> {
        let now = self.clock.now();
        let mut record = capture(page, self.config.max_value_len, now)?;
        if let Some(session_id) = self.sessions.current() {
            record.set_session_id(session_id);
        }
        let outcome = self.records.write(&record);
        info!(
            params = ?record.params().keys().map(|p| p.as_str()).collect::<Vec<_>>(),
            stored = ?outcome,
            "attribution captured"
        );
        Some((record, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use utmkeep_core::TrackedParam;
    use utmkeep_dom::MemoryDocument;
    use utmkeep_storage::{MemoryCookieJar, MemoryStore};

    type Tracker = AttributionTracker<MemoryStore, MemoryCookieJar, MemoryStore>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn tracker(clock: Arc<ManualClock>) -> Tracker {
        AttributionTracker::new(
            TrackerConfig::default(),
            MemoryStore::new(),
            MemoryCookieJar::new(),
            MemoryStore::new(),
        )
        .with_clock(clock)
    }

    fn page(url: &str) -> PageContext {
        PageContext::parse(url, "").expect("url")
    }

    #[test]
    fn init_captures_tags_and_fills() {
        let clock = Arc::new(ManualClock::new(t0()));
        let tracker = tracker(clock);
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let source = doc.add_input(form, "field-utm_source");
        let session = doc.add_input(form, "field-session_id");

        let outcome = tracker.init(&page("https://a.example/?utm_source=bing"), &mut doc);
        assert!(outcome.captured);
        assert_eq!(outcome.write, Some(WriteOutcome::Primary));
        assert_eq!(outcome.replay.filled, 2);
        assert_eq!(doc.value(source), "bing");

        let stored = tracker.get_data().expect("stored");
        let session_id = stored.session_id().expect("tagged").to_string();
        assert_eq!(doc.value(session), session_id);
        assert_eq!(tracker.sessions().current(), Some(session_id));
    }

    #[test]
    fn init_without_params_keeps_existing_record() {
        let clock = Arc::new(ManualClock::new(t0()));
        let tracker = tracker(Arc::clone(&clock));
        let mut doc = MemoryDocument::new();
        tracker.init(&page("https://a.example/?utm_source=bing&utm_term=x"), &mut doc);

        clock.advance(Duration::days(3));
        let outcome = tracker.init(&page("https://a.example/pricing?plan=pro"), &mut doc);
        assert!(!outcome.captured);
        // Session id already merged, nothing to rewrite.
        assert_eq!(outcome.write, None);
        let record = outcome.record.expect("kept");
        assert_eq!(record.param(TrackedParam::UtmTerm), Some("x"));
        assert_eq!(record.captured_at(), t0());
    }

    #[test]
    fn new_params_overwrite_without_merging() {
        let clock = Arc::new(ManualClock::new(t0()));
        let tracker = tracker(Arc::clone(&clock));
        let mut doc = MemoryDocument::new();
        tracker.init(&page("https://a.example/?utm_source=bing&utm_term=x"), &mut doc);
        let first_session = tracker.sessions().current();

        clock.advance(Duration::hours(1));
        tracker.init(&page("https://a.example/?gclid=G1"), &mut doc);
        let record = tracker.get_data().expect("record");
        assert_eq!(record.param(TrackedParam::Gclid), Some("G1"));
        assert_eq!(record.param(TrackedParam::UtmSource), None);
        assert_eq!(record.captured_at(), t0() + Duration::hours(1));
        assert_eq!(record.session_id().map(str::to_string), first_session);
    }

    #[test]
    fn attach_to_form_targets_one_form() {
        let clock = Arc::new(ManualClock::new(t0()));
        let tracker = tracker(clock);
        tracker.save_from_url(&page("https://a.example/?utm_medium=email"));

        let mut doc = MemoryDocument::new();
        let a = doc.add_form(Some("a"));
        let b = doc.add_form(Some("b"));
        let in_a = doc.add_input(a, "field-utm_medium");
        let in_b = doc.add_input(b, "field-utm_medium");

        let report = tracker.attach_to_form(&mut doc, "b").expect("form exists");
        assert_eq!(report.filled, 1);
        assert_eq!(doc.value(in_a), "");
        assert_eq!(doc.value(in_b), "email");
        assert_eq!(tracker.attach_to_form(&mut doc, "missing"), None);
    }

    #[test]
    fn attach_without_record_reports_nothing() {
        let tracker = tracker(Arc::new(ManualClock::new(t0())));
        let mut doc = MemoryDocument::new();
        doc.add_form(Some("a"));
        assert_eq!(
            tracker.attach_to_form(&mut doc, "a"),
            Some(ReplayReport::default())
        );
    }

    #[test]
    fn clear_removes_record_but_not_session() {
        let tracker = tracker(Arc::new(ManualClock::new(t0())));
        let mut doc = MemoryDocument::new();
        tracker.init(&page("https://a.example/?fbclid=F"), &mut doc);
        tracker.clear();
        assert_eq!(tracker.get_data(), None);
        assert!(tracker.sessions().current().is_some());
    }

    #[test]
    fn check_and_clear_fields() {
        let tracker = tracker(Arc::new(ManualClock::new(t0())));
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        doc.add_input(form, "field-utm_source");
        tracker.init(&page("https://a.example/?utm_source=bing"), &mut doc);

        let status = tracker.check_fields(&doc);
        assert_eq!(status["field-utm_source"].filled, 1);
        assert_eq!(tracker.clear_fields(&mut doc), 1);
        assert_eq!(tracker.check_fields(&doc)["field-utm_source"].filled, 0);
    }

    #[test]
    fn save_from_url_without_params_leaves_storage() {
        let tracker = tracker(Arc::new(ManualClock::new(t0())));
        tracker.save_from_url(&page("https://a.example/?utm_source=bing"));
        assert_eq!(tracker.save_from_url(&page("https://a.example/")), None);
        assert!(tracker.get_data().is_some());
    }
}
