//! The ordered, immutable log model
//!
//! A [`KeyEventLog`] is the result of one full parse: decoded and validated
//! events in sequence-number order, stream-level diagnostics, and the final
//! key state per identifier. The presentation layer reads it as plain
//! structured data; the query engine evaluates over it without ever
//! mutating it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kerilog_cesr::decode_stream;
use kerilog_core::{Diagnostic, KeyEvent, KeyState, Prefix, Result, Threshold};
use kerilog_query::FilterExpression;
use kerilog_validate::ChainValidator;

/// One validated log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// The decoded event
    pub event: KeyEvent,
    /// Decode and validation diagnostics together
    pub diagnostics: Vec<Diagnostic>,
    /// Whether chain validation accepted the event
    pub accepted: bool,
    /// Key state snapshot for the event's identifier after this event
    pub state: Option<KeyState>,
}

/// A fully parsed and validated key event log
#[derive(Debug, Clone)]
pub struct KeyEventLog {
    source_label: Option<String>,
    entries: Vec<LogEntry>,
    stream_diagnostics: Vec<Diagnostic>,
    final_states: IndexMap<Prefix, KeyState>,
}

impl KeyEventLog {
    /// Run the full pipeline over raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_labeled(bytes, None)
    }

    /// Run the full pipeline, labelling diagnostics output with the byte
    /// source they came from
    pub fn parse_labeled(bytes: &[u8], label: Option<&str>) -> Result<Self> {
        let outcome = decode_stream(bytes)?;
        let mut validator = ChainValidator::new();
        let mut entries: Vec<LogEntry> = outcome
            .events
            .into_iter()
            .map(|decoded| {
                let validated = validator.validate(decoded);
                LogEntry {
                    event: validated.event,
                    diagnostics: validated.diagnostics,
                    accepted: validated.accepted,
                    state: validated.state,
                }
            })
            .collect();
        // stable: events sharing a sequence number keep stream order
        entries.sort_by_key(|entry| entry.event.sn);
        let log = Self {
            source_label: label.map(str::to_string),
            entries,
            stream_diagnostics: outcome.stream_diagnostics,
            final_states: validator.into_states(),
        };
        tracing::info!(
            source = log.source_label.as_deref().unwrap_or("<bytes>"),
            events = log.entries.len(),
            identifiers = log.final_states.len(),
            clean = log.is_clean(),
            "key event log parsed"
        );
        Ok(log)
    }

    /// Where the bytes came from, when the caller said
    pub fn source_label(&self) -> Option<&str> {
        self.source_label.as_deref()
    }

    /// All entries in sequence-number order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Faults not attributable to any single event
    pub fn stream_diagnostics(&self) -> &[Diagnostic] {
        &self.stream_diagnostics
    }

    /// Final key state per identifier, in first-seen order
    pub fn final_states(&self) -> &IndexMap<Prefix, KeyState> {
        &self.final_states
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no events decoded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the whole parse produced no diagnostics at all
    pub fn is_clean(&self) -> bool {
        self.stream_diagnostics.is_empty()
            && self.entries.iter().all(|entry| entry.diagnostics.is_empty())
    }

    /// Lazily evaluate a filter over the log, preserving order
    ///
    /// Restartable: the returned iterator borrows the log and can be
    /// recreated at will; evaluation never mutates the underlying model.
    pub fn filter<'a>(
        &'a self,
        filter: &'a FilterExpression,
    ) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| filter.matches(&entry.event, &entry.diagnostics))
    }

    /// The "filter by type" shortcut, compiled through the same evaluator
    pub fn filter_by_kind(&self, kind: &str) -> Vec<&LogEntry> {
        let filter = FilterExpression::kind_shortcut(kind);
        self.entries
            .iter()
            .filter(|entry| filter.matches(&entry.event, &entry.diagnostics))
            .collect()
    }

    /// Entries for one identifier only
    pub fn restricted_to<'a>(
        &'a self,
        prefix: &'a Prefix,
    ) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.event.prefix.as_ref() == Some(prefix))
    }

    /// Group entries by identifier; prefix-less messages group under their
    /// pluralized kind label
    pub fn group_by_identifier(&self) -> IndexMap<String, Vec<&LogEntry>> {
        let mut grouped: IndexMap<String, Vec<&LogEntry>> = IndexMap::new();
        for entry in &self.entries {
            let key = match &entry.event.prefix {
                Some(prefix) => prefix.as_str().to_string(),
                None => pluralize(entry.event.kind.label()),
            };
            grouped.entry(key).or_default().push(entry);
        }
        grouped
    }

    /// The structured representation handed to the presentation layer
    pub fn records(&self) -> Vec<EventRecord> {
        self.entries.iter().map(EventRecord::from_entry).collect()
    }

    /// The trailing summary object
    pub fn summary(&self) -> LogSummary {
        let diagnostic_count = self.stream_diagnostics.len()
            + self
                .entries
                .iter()
                .map(|entry| entry.diagnostics.len())
                .sum::<usize>();
        LogSummary {
            clean: self.is_clean(),
            event_count: self.entries.len(),
            diagnostic_count,
            final_states: self
                .final_states
                .iter()
                .map(|(prefix, state)| (prefix.as_str().to_string(), state.clone()))
                .collect(),
        }
    }
}

fn pluralize(label: &str) -> String {
    match label.strip_suffix('y') {
        Some(stem) => format!("{stem}ies"),
        None => format!("{label}s"),
    }
}

/// One event as plain structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wire code of the kind
    pub kind: String,
    /// Human-readable kind label
    pub kind_label: String,
    /// Sequence number
    pub sn: u64,
    /// Identifier prefix, empty for prefix-less messages
    pub identifier: String,
    /// Own digest
    pub digest: String,
    /// Prior digest
    pub prior: Option<String>,
    /// Signing keys
    pub keys: Vec<String>,
    /// Signing threshold in display form
    pub threshold: Option<String>,
    /// Next-key digest commitment
    pub next_digests: Vec<String>,
    /// Seals, verbatim
    pub seals: Vec<Value>,
    /// Diagnostics attached to this event
    pub diagnostics: Vec<Diagnostic>,
    /// Whether chain validation accepted the event
    pub accepted: bool,
    /// Verbatim text for the "copy raw" affordance
    pub raw: String,
}

impl EventRecord {
    /// Project one log entry into the output shape
    pub fn from_entry(entry: &LogEntry) -> Self {
        let event = &entry.event;
        Self {
            kind: event.kind.code().to_string(),
            kind_label: event.kind.label().to_string(),
            sn: event.sn,
            identifier: event.identifier_str().to_string(),
            digest: event.digest.as_str().to_string(),
            prior: event.prior.as_ref().map(|p| p.as_str().to_string()),
            keys: event.keys.iter().map(|k| k.as_str().to_string()).collect(),
            threshold: event.threshold.as_ref().map(Threshold::to_string),
            next_digests: event
                .next_digests
                .iter()
                .map(|d| d.as_str().to_string())
                .collect(),
            seals: event.seals.iter().map(|seal| seal.0.clone()).collect(),
            diagnostics: entry.diagnostics.clone(),
            accepted: entry.accepted,
            raw: event.raw_verbatim(),
        }
    }
}

/// The trailing summary object of the structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSummary {
    /// True when the parse produced no diagnostics
    pub clean: bool,
    /// Number of decoded events
    pub event_count: usize,
    /// Total diagnostics, stream-level included
    pub diagnostic_count: usize,
    /// Final key state per identifier
    pub final_states: IndexMap<String, KeyState>,
}
