//! Writing a stored attribution record into the document's forms.
//!
//! Replay is idempotent: a second pass over the same document finds every
//! field already populated and changes nothing.

use serde::Serialize;
use std::ops::AddAssign;
use tracing::{debug, info};
use utmkeep_core::{AttributionRecord, FieldBinding, ReplayStrategy, TrackerConfig};

use crate::document::{FormDocument, NodeId};

/// What one replay pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub forms_seen: usize,
    /// Forms skipped because of the opt-out attribute.
    pub forms_skipped: usize,
    /// Existing fields whose value changed.
    pub filled: usize,
    /// Hidden inputs created.
    pub appended: usize,
}

impl ReplayReport {
    pub fn touched(&self) -> usize {
        self.filled + self.appended
    }
}

impl AddAssign for ReplayReport {
    fn add_assign(&mut self, rhs: Self) {
        self.forms_seen += rhs.forms_seen;
        self.forms_skipped += rhs.forms_skipped;
        self.filled += rhs.filled;
        self.appended += rhs.appended;
    }
}

/// Replay bound to one configuration.
pub struct Replayer<'a> {
    config: &'a TrackerConfig,
    bindings: Vec<FieldBinding>,
}

impl<'a> Replayer<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self {
            config,
            bindings: config.bindings(),
        }
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Replay into every form. With no record nothing is touched.
    pub fn replay_document<D: FormDocument + ?Sized>(
        &self,
        doc: &mut D,
        record: Option<&AttributionRecord>,
    ) -> ReplayReport {
        let Some(record) = record else {
            debug!("no attribution record, nothing to replay");
            return ReplayReport::default();
        };

        let mut report = ReplayReport::default();
        for form in doc.forms() {
            report += self.replay_form(doc, form, record);
        }
        if report.touched() > 0 {
            info!(
                filled = report.filled,
                appended = report.appended,
                forms = report.forms_seen,
                "attribution fields populated"
            );
        }
        report
    }

    /// Replay into one form, honouring the opt-out attribute.
    pub fn replay_form<D: FormDocument + ?Sized>(
        &self,
        doc: &mut D,
        form: NodeId,
        record: &AttributionRecord,
    ) -> ReplayReport {
        let mut report = ReplayReport {
            forms_seen: 1,
            ..ReplayReport::default()
        };
        if self.is_opted_out(doc, form) {
            debug!(form = form.0, "form opted out of attribution");
            report.forms_skipped = 1;
            return report;
        }

        match self.config.strategy {
            ReplayStrategy::FillExisting => {
                report.filled = self.fill_existing(doc, form, record);
            }
            ReplayStrategy::AppendHidden => {
                let (filled, appended) = self.append_hidden(doc, form, record, true);
                report.filled = filled;
                report.appended = appended;
            }
            ReplayStrategy::Both => {
                let filled = self.fill_existing(doc, form, record);
                let (overwritten, appended) = self.append_hidden(doc, form, record, false);
                report.filled = filled + overwritten;
                report.appended = appended;
            }
        }
        report
    }

    pub fn is_opted_out<D: FormDocument + ?Sized>(&self, doc: &D, form: NodeId) -> bool {
        doc.has_attribute(form, &self.config.opt_out_attr)
    }

    /// Set the first input per bound class when it is blank.
    fn fill_existing<D: FormDocument + ?Sized>(
        &self,
        doc: &mut D,
        form: NodeId,
        record: &AttributionRecord,
    ) -> usize {
        let mut filled = 0;
        for binding in &self.bindings {
            let Some(value) = record.get(binding.key) else {
                continue;
            };
            let Some(input) = doc.inputs_with_class(Some(form), &binding.css_class).first().copied()
            else {
                continue;
            };
            if !doc.value(input).trim().is_empty() {
                continue;
            }
            doc.set_value(input, value);
            filled += 1;
            debug!(class = %binding.css_class, value, "filled attribution input");
        }
        filled
    }

    /// Write every record field into a same-named field, appending a hidden
    /// input where none exists. Existing non-empty values are replaced only
    /// when `overwrite` is set. Returns `(filled, appended)`.
    fn append_hidden<D: FormDocument + ?Sized>(
        &self,
        doc: &mut D,
        form: NodeId,
        record: &AttributionRecord,
        overwrite: bool,
    ) -> (usize, usize) {
        let (mut filled, mut appended) = (0, 0);
        for (key, value) in record.fields() {
            let name = key.as_str();
            match doc.field_by_name(form, name) {
                Some(field) => {
                    let current = doc.value(field);
                    if current == value || (!overwrite && !current.trim().is_empty()) {
                        continue;
                    }
                    doc.set_value(field, value);
                    filled += 1;
                    debug!(name, value, "updated attribution field");
                }
                None => {
                    if doc
                        .append_hidden_input(form, name, value, &self.config.hidden_field)
                        .is_some()
                    {
                        appended += 1;
                        debug!(name, value, "appended hidden attribution field");
                    }
                }
            }
        }
        (filled, appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use utmkeep_core::TrackedParam;

    fn record() -> AttributionRecord {
        let params = BTreeMap::from([
            (TrackedParam::UtmSource, "google".to_string()),
            (TrackedParam::UtmMedium, "cpc".to_string()),
        ]);
        let ts = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        AttributionRecord::new(params, "https://shop.example/?utm_source=google", "", ts)
            .expect("record")
            .with_session_id("sess_1_abcdefghi")
    }

    fn config(strategy: ReplayStrategy) -> TrackerConfig {
        TrackerConfig {
            strategy,
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn fill_existing_sets_blank_inputs() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let source = doc.add_input(form, "field-utm_source");
        let medium = doc.add_input(form, "field-utm_medium");
        let landing = doc.add_input(form, "field-landing_page");
        let campaign = doc.add_input(form, "field-utm_campaign");

        let cfg = config(ReplayStrategy::FillExisting);
        let report = Replayer::new(&cfg).replay_document(&mut doc, Some(&record()));

        assert_eq!(doc.value(source), "google");
        assert_eq!(doc.value(medium), "cpc");
        assert_eq!(doc.value(landing), "https://shop.example/?utm_source=google");
        assert_eq!(doc.value(campaign), "");
        assert_eq!(report.filled, 3);
        assert_eq!(report.appended, 0);
    }

    #[test]
    fn fill_existing_keeps_user_input() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let source = doc.add_input(form, "field-utm_source");
        doc.type_value(source, "newsletter");

        let cfg = config(ReplayStrategy::FillExisting);
        let report = Replayer::new(&cfg).replay_document(&mut doc, Some(&record()));
        assert_eq!(doc.value(source), "newsletter");
        assert_eq!(report.filled, 0);
    }

    #[test]
    fn fill_existing_only_first_match_per_class() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let first = doc.add_input(form, "field-utm_source");
        let second = doc.add_input(form, "field-utm_source");

        let cfg = config(ReplayStrategy::FillExisting);
        Replayer::new(&cfg).replay_document(&mut doc, Some(&record()));
        assert_eq!(doc.value(first), "google");
        assert_eq!(doc.value(second), "");
    }

    #[test]
    fn append_hidden_creates_then_reuses_fields() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(Some("lead"));
        let existing = doc.add_element(form, "input", &[("name", "utm_source"), ("value", "old")]);

        let cfg = config(ReplayStrategy::AppendHidden);
        let replayer = Replayer::new(&cfg);
        let first = replayer.replay_document(&mut doc, Some(&record()));
        assert_eq!(doc.value(existing), "google");
        // utm_medium, landing_url, session_id appended; referrer is empty.
        assert_eq!(first.filled, 1);
        assert_eq!(first.appended, 3);

        let count = doc.element_count();
        let html = doc.to_html(doc.root());
        let second = replayer.replay_document(&mut doc, Some(&record()));
        assert_eq!(second.touched(), 0);
        assert_eq!(doc.element_count(), count);
        assert_eq!(doc.to_html(doc.root()), html);
    }

    #[test]
    fn both_fills_then_appends_without_overwriting() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let source = doc.add_element(
            form,
            "input",
            &[("class", "field-utm_source"), ("name", "utm_source")],
        );
        let medium = doc.add_element(form, "input", &[("name", "utm_medium")]);
        doc.type_value(medium, "email");

        let cfg = config(ReplayStrategy::Both);
        let report = Replayer::new(&cfg).replay_document(&mut doc, Some(&record()));
        assert_eq!(doc.value(source), "google");
        assert_eq!(doc.value(medium), "email");
        assert_eq!(report.filled, 1);
        // landing_url and session_id
        assert_eq!(report.appended, 2);
    }

    #[test]
    fn opted_out_form_is_untouched() {
        for strategy in [
            ReplayStrategy::FillExisting,
            ReplayStrategy::AppendHidden,
            ReplayStrategy::Both,
        ] {
            let mut doc = MemoryDocument::new();
            let form = doc.add_form(None);
            doc.set_attribute(form, "data-no-utm", "");
            doc.add_input(form, "field-utm_source");
            let before = doc.clone();

            let cfg = config(strategy);
            let report = Replayer::new(&cfg).replay_document(&mut doc, Some(&record()));
            assert_eq!(doc, before);
            assert_eq!(report.forms_skipped, 1);
            assert_eq!(report.touched(), 0);
        }
    }

    #[test]
    fn no_record_means_no_mutation() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        doc.add_input(form, "field-utm_source");
        let before = doc.clone();

        let cfg = config(ReplayStrategy::AppendHidden);
        let report = Replayer::new(&cfg).replay_document(&mut doc, None);
        assert_eq!(report, ReplayReport::default());
        assert_eq!(doc, before);
    }

    #[test]
    fn report_serializes() {
        let report = ReplayReport {
            forms_seen: 2,
            forms_skipped: 1,
            filled: 3,
            appended: 0,
        };
        let json = serde_json::to_value(report).expect("serialize");
        assert_eq!(json["filled"], 3);
        assert_eq!(json["forms_skipped"], 1);
    }
}
