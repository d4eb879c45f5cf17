//! Partial label selection.
//!
//! Given the label sets available for a test and a partially chosen filter, this module narrows
//! the label sets that still match, lists the candidate values for every label key and decides
//! when a selection should be reported to the caller.

use crate::fingerprint::{display_label_string, format_label_value, LabelSet};

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Shown in place of a label that a label set does not have.
pub const MISSING_LABEL: &str = "--";

/// When the selection callback fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FireMode {
    /// Only when the selection narrows down to exactly one label set.
    #[default]
    Conservative,
    /// On every change, with the partial selection unless a single label set remains.
    Eager,
}

impl FireMode {
    /// Returns [FireMode::Eager] when firing on partial selections was requested.
    pub fn new(fire_on_partial: bool) -> Self {
        if fire_on_partial {
            Self::Eager
        } else {
            Self::Conservative
        }
    }
}

/// Label data together with its display projection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Selection {
    labels: LabelSet,
    display: String,
}

impl Selection {
    /// Wrap a label set, computing its display string.
    pub fn new(labels: LabelSet) -> Self {
        let display = display_label_string(Some(&labels));
        Self { labels, display }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn into_labels(self) -> LabelSet {
        self.labels
    }
}

/// Reported to the selection callback.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SelectionEvent {
    /// Exactly one label set matches.
    Full(Selection),
    /// Some keys are chosen and more than one label set still matches.
    Partial(Selection),
    /// The selection was explicitly cleared. This is distinct from never having selected.
    Cleared,
}

impl SelectionEvent {
    /// Display string of the selection; empty when cleared.
    pub fn display(&self) -> &str {
        match self {
            Self::Full(selection) | Self::Partial(selection) => selection.display(),
            Self::Cleared => "",
        }
    }

    /// Selected labels, if any.
    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            Self::Full(selection) | Self::Partial(selection) => Some(selection.labels()),
            Self::Cleared => None,
        }
    }
}

/// Selector state for one label key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyWidget {
    /// Label key
    pub key: String,
    /// Distinct values the key takes among the label sets matching the other chosen keys
    pub options: Vec<Value>,
    /// Explicitly chosen value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<Value>,
    /// Only one value is possible and none was chosen
    pub read_only: bool,
}

/// What a label filter renders.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum FilterView {
    /// There are no label sets; an explicit placeholder is shown instead of selectors.
    Empty,
    /// One selector per label key.
    Widgets { widgets: Vec<KeyWidget> },
}

/// Structural equality of JSON values.
///
/// Objects are equal when they have the same keys (in any order) with equal values, arrays when
/// they are elementwise equal. Numbers compare by value, so `1` equals `1.0`.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        // Integers compare exactly; only a float on either side falls back to f64.
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
            x.as_f64() == y.as_f64()
        }
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| deep_equals(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, x)| y.get(key).map_or(false, |y| deep_equals(x, y)))
        }
        _ => a == b,
    }
}

/// Does a label set have every chosen key with an equal value?
pub fn matches_selection(labels: &LabelSet, selection: &LabelSet) -> bool {
    selection.iter().all(|(key, chosen)| {
        labels
            .get(key)
            .map_or(false, |value| deep_equals(value, chosen))
    })
}

/// Returns the label sets matching every key of the selection. Keys not in the selection match
/// anything.
pub fn filtered_candidates<'a>(
    label_sets: &'a [LabelSet],
    selection: &LabelSet,
) -> Vec<&'a LabelSet> {
    label_sets
        .iter()
        .filter(|labels| matches_selection(labels, selection))
        .collect()
}

/// Returns the distinct values of `key` across the label sets, in display order.
///
/// Label sets without the key contribute nothing.
pub fn candidate_values(filtered: &[&LabelSet], key: &str) -> Vec<Value> {
    let mut values: Vec<Value> = Vec::new();
    for value in filtered.iter().filter_map(|labels| labels.get(key)) {
        if !values.iter().any(|existing| deep_equals(existing, value)) {
            values.push(value.clone());
        }
    }
    values.sort_by(compare_values);
    values
}

/// Returns every key used by any of the label sets, in first-seen order.
pub fn all_keys(label_sets: &[LabelSet]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in label_sets.iter().flat_map(|labels| labels.keys()) {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    keys
}

/// Total display order of JSON values.
///
/// Values of different types order as null, booleans, numbers, strings, arrays, objects.
/// Arrays and objects compare by their JSON text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Display text of one label of a label set, or [MISSING_LABEL] when absent.
pub fn label_cell(labels: &LabelSet, key: &str) -> String {
    labels
        .get(key)
        .map(format_label_value)
        .unwrap_or_else(|| MISSING_LABEL.to_string())
}

/// Builds the selector of every key.
///
/// Each key's options are computed as if that key were not chosen, so that opening a selector
/// to re-pick offers every value compatible with the other keys.
pub fn widgets(label_sets: &[LabelSet], selection: &LabelSet) -> Vec<KeyWidget> {
    all_keys(label_sets)
        .into_iter()
        .map(|key| {
            let others: LabelSet = selection
                .iter()
                .filter(|(k, _)| **k != key)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let filtered = filtered_candidates(label_sets, &others);
            let options = candidate_values(&filtered, &key);
            let selected = selection.get(&key).cloned();
            let read_only = selected.is_none() && options.len() == 1;
            KeyWidget {
                key,
                options,
                selected,
                read_only,
            }
        })
        .collect()
}

/// Returns the view of a label filter over the label sets.
pub fn view(label_sets: &[LabelSet], selection: &LabelSet) -> FilterView {
    if label_sets.is_empty() {
        FilterView::Empty
    } else {
        FilterView::Widgets {
            widgets: widgets(label_sets, selection),
        }
    }
}

/// Returns the event that the current selection should report, if any.
fn selection_event(
    label_sets: &[LabelSet],
    selection: &LabelSet,
    mode: FireMode,
) -> Option<SelectionEvent> {
    let filtered = filtered_candidates(label_sets, selection);
    match (filtered.as_slice(), mode) {
        ([single], _) => Some(SelectionEvent::Full(Selection::new((*single).clone()))),
        (_, FireMode::Conservative) => None,
        (_, FireMode::Eager) if selection.is_empty() => Some(SelectionEvent::Cleared),
        (_, FireMode::Eager) => Some(SelectionEvent::Partial(Selection::new(selection.clone()))),
    }
}

/// A label set still matching the selection, as a table row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateRow {
    pub labels: LabelSet,
    pub display: String,
    /// One cell per label key, see [all_keys]
    pub cells: Vec<String>,
}

/// Snapshot of a label filter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resolution {
    pub keys: Vec<String>,
    #[serde(flatten)]
    pub view: FilterView,
    pub filtered: Vec<CandidateRow>,
    /// What a selection callback would be invoked with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionEvent>,
}

/// Resolves a selection against the label sets in one go.
pub fn resolve(label_sets: &[LabelSet], selection: &LabelSet, mode: FireMode) -> Resolution {
    let keys = all_keys(label_sets);
    let filtered = filtered_candidates(label_sets, selection)
        .into_iter()
        .map(|labels| CandidateRow {
            labels: labels.clone(),
            display: display_label_string(Some(labels)),
            cells: keys.iter().map(|key| label_cell(labels, key)).collect(),
        })
        .collect();
    Resolution {
        view: view(label_sets, selection),
        keys,
        filtered,
        selection: selection_event(label_sets, selection, mode),
    }
}

/// Interactive label filter.
///
/// Holds the available label sets and the partial selection, and invokes `on_select` according
/// to the [FireMode].
pub struct LabelFilter<F> {
    label_sets: Vec<LabelSet>,
    selection: LabelSet,
    mode: FireMode,
    on_select: F,
}

impl<F> LabelFilter<F>
where
    F: FnMut(&SelectionEvent),
{
    /// Create a filter with nothing selected.
    ///
    /// When there is exactly one label set it is selected straight away and `on_select` is
    /// invoked once.
    pub fn new(label_sets: Vec<LabelSet>, mode: FireMode, on_select: F) -> Self {
        let mut filter = Self {
            label_sets,
            selection: LabelSet::new(),
            mode,
            on_select,
        };
        filter.select_single();
        filter
    }

    /// Create a filter with an initial selection, e.g. restored from a URL. Nothing fires unless
    /// there is exactly one label set.
    pub fn with_selection(
        label_sets: Vec<LabelSet>,
        selection: LabelSet,
        mode: FireMode,
        on_select: F,
    ) -> Self {
        let mut filter = Self::new(label_sets, mode, on_select);
        if filter.label_sets.len() != 1 {
            filter.selection = selection;
        }
        filter
    }

    fn select_single(&mut self) {
        if let [single] = self.label_sets.as_slice() {
            self.selection = single.clone();
            let event = SelectionEvent::Full(Selection::new(single.clone()));
            (self.on_select)(&event);
        }
    }

    fn fire(&mut self) {
        if let Some(event) = selection_event(&self.label_sets, &self.selection, self.mode) {
            (self.on_select)(&event);
        }
    }

    /// Choose a value for a key.
    pub fn select(&mut self, key: &str, value: Value) {
        self.selection.insert(key.to_string(), value);
        self.fire();
    }

    /// Unset a key.
    pub fn clear(&mut self, key: &str) {
        if !self.selection.contains_key(key) {
            return;
        }
        // Rebuild rather than remove to keep the remaining keys in order.
        self.selection = self
            .selection
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.fire();
    }

    /// Clear the whole selection and report [SelectionEvent::Cleared].
    pub fn reset(&mut self) {
        self.selection = LabelSet::new();
        (self.on_select)(&SelectionEvent::Cleared);
    }

    /// Replace the label sets, e.g. after the test changed. The selection starts over.
    pub fn replace_label_sets(&mut self, label_sets: Vec<LabelSet>) {
        self.label_sets = label_sets;
        self.selection = LabelSet::new();
        self.select_single();
    }

    pub fn label_sets(&self) -> &[LabelSet] {
        &self.label_sets
    }

    pub fn selection(&self) -> &LabelSet {
        &self.selection
    }

    /// Label sets matching the current selection.
    pub fn filtered(&self) -> Vec<&LabelSet> {
        filtered_candidates(&self.label_sets, &self.selection)
    }

    pub fn widgets(&self) -> Vec<KeyWidget> {
        widgets(&self.label_sets, &self.selection)
    }

    pub fn view(&self) -> FilterView {
        view(&self.label_sets, &self.selection)
    }
}
