//! Field introspection and clearing across the whole document.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use utmkeep_core::{AttributionKey, FieldBinding};

use crate::document::FormDocument;

/// Fill status of the inputs bound to one CSS class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldStatus {
    pub param: AttributionKey,
    /// Inputs carrying the class.
    pub found: usize,
    /// Inputs with a non-blank value.
    pub filled: usize,
    pub values: Vec<String>,
}

/// Status per bound CSS class, including classes with no inputs.
pub fn check_fields<D: FormDocument + ?Sized>(
    doc: &D,
    bindings: &[FieldBinding],
) -> BTreeMap<String, FieldStatus> {
    bindings
        .iter()
        .map(|binding| {
            let inputs = doc.inputs_with_class(None, &binding.css_class);
            let values: Vec<String> = inputs
                .iter()
                .map(|id| doc.value(*id))
                .filter(|v| !v.trim().is_empty())
                .collect();
            let status = FieldStatus {
                param: binding.key,
                found: inputs.len(),
                filled: values.len(),
                values,
            };
            (binding.css_class.clone(), status)
        })
        .collect()
}

/// Blank every bound input outside opted-out forms. Returns how many
/// inputs had a value.
pub fn clear_fields<D: FormDocument + ?Sized>(
    doc: &mut D,
    bindings: &[FieldBinding],
    opt_out_attr: &str,
) -> usize {
    let mut cleared = 0;
    for binding in bindings {
        for input in doc.inputs_with_class(None, &binding.css_class) {
            if doc
                .enclosing_form(input)
                .is_some_and(|form| doc.has_attribute(form, opt_out_attr))
            {
                continue;
            }
            if doc.value(input).is_empty() {
                continue;
            }
            doc.set_value(input, "");
            cleared += 1;
        }
    }
    info!(cleared, "attribution fields cleared");
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use utmkeep_core::{TrackedParam, TrackerConfig};

    #[test]
    fn check_reports_found_and_filled() {
        let mut doc = MemoryDocument::new();
        let a = doc.add_form(None);
        let b = doc.add_form(None);
        let first = doc.add_input(a, "field-utm_source");
        doc.add_input(b, "field-utm_source");
        doc.type_value(first, "google");

        let status = check_fields(&doc, &TrackerConfig::default().bindings());
        let source = &status["field-utm_source"];
        assert_eq!(source.param, AttributionKey::Param(TrackedParam::UtmSource));
        assert_eq!(source.found, 2);
        assert_eq!(source.filled, 1);
        assert_eq!(source.values, vec!["google".to_string()]);

        let gclid = &status["field-gclid"];
        assert_eq!((gclid.found, gclid.filled), (0, 0));
        assert_eq!(status.len(), 11);
    }

    #[test]
    fn check_output_serializes_with_param_names() {
        let doc = MemoryDocument::new();
        let status = check_fields(&doc, &TrackerConfig::default().bindings());
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["field-referrer"]["param"], "referrer_url");
    }

    #[test]
    fn clear_blanks_bound_inputs_only() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        let bound = doc.add_input(form, "field-utm_medium");
        let other = doc.add_input(form, "email");
        let loose = doc.add_input(doc.root(), "field-gclid");
        doc.type_value(bound, "cpc");
        doc.type_value(other, "me@example.com");
        doc.type_value(loose, "abc");

        let cfg = TrackerConfig::default();
        let cleared = clear_fields(&mut doc, &cfg.bindings(), &cfg.opt_out_attr);
        assert_eq!(cleared, 2);
        assert_eq!(doc.value(bound), "");
        assert_eq!(doc.value(loose), "");
        assert_eq!(doc.value(other), "me@example.com");
    }

    #[test]
    fn clear_skips_opted_out_forms() {
        let mut doc = MemoryDocument::new();
        let form = doc.add_form(None);
        doc.set_attribute(form, "data-no-utm", "");
        let input = doc.add_input(form, "field-utm_source");
        doc.type_value(input, "kept");

        let cfg = TrackerConfig::default();
        assert_eq!(clear_fields(&mut doc, &cfg.bindings(), &cfg.opt_out_attr), 0);
        assert_eq!(doc.value(input), "kept");
    }
}
