//! FormDocument trait: the slice of the DOM that replay reads and writes.

use utmkeep_core::HiddenFieldMarkup;

/// Handle to an element inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Document access used by replay and field inspection. Lookups return
/// handles in document order; stale handles read as empty and writes to
/// them are ignored.
pub trait FormDocument {
    /// Every `<form>` element.
    fn forms(&self) -> Vec<NodeId>;

    fn form_by_id(&self, id: &str) -> Option<NodeId>;

    fn has_attribute(&self, node: NodeId, name: &str) -> bool;

    /// `<input>` elements carrying `class`, inside `scope` or anywhere when
    /// `scope` is `None`.
    fn inputs_with_class(&self, scope: Option<NodeId>, class: &str) -> Vec<NodeId>;

    /// First `input`, `select` or `textarea` named `name` inside `form`.
    fn field_by_name(&self, form: NodeId, name: &str) -> Option<NodeId>;

    /// Closest `<form>` ancestor.
    fn enclosing_form(&self, node: NodeId) -> Option<NodeId>;

    /// Current value of a form control.
    fn value(&self, field: NodeId) -> String;

    fn set_value(&mut self, field: NodeId, value: &str);

    /// Append `<input type="hidden">` to `form`, wrapped per `markup`.
    /// Returns the new input.
    fn append_hidden_input(
        &mut self,
        form: NodeId,
        name: &str,
        value: &str,
        markup: &HiddenFieldMarkup,
    ) -> Option<NodeId>;
}

impl<T: FormDocument + ?Sized> FormDocument for &mut T {
    fn forms(&self) -> Vec<NodeId> {
        (**self).forms()
    }
    fn form_by_id(&self, id: &str) -> Option<NodeId> {
        (**self).form_by_id(id)
    }
    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        (**self).has_attribute(node, name)
    }
    fn inputs_with_class(&self, scope: Option<NodeId>, class: &str) -> Vec<NodeId> {
        (**self).inputs_with_class(scope, class)
    }
    fn field_by_name(&self, form: NodeId, name: &str) -> Option<NodeId> {
        (**self).field_by_name(form, name)
    }
    fn enclosing_form(&self, node: NodeId) -> Option<NodeId> {
        (**self).enclosing_form(node)
    }
    fn value(&self, field: NodeId) -> String {
        (**self).value(field)
    }
    fn set_value(&mut self, field: NodeId, value: &str) {
        (**self).set_value(field, value)
    }
    fn append_hidden_input(
        &mut self,
        form: NodeId,
        name: &str,
        value: &str,
        markup: &HiddenFieldMarkup,
    ) -> Option<NodeId> {
        (**self).append_hidden_input(form, name, value, markup)
    }
}
