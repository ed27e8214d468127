//! Iterative action history: what the model did in earlier rounds.
//!
//! Replayed into each iterative prompt so the model can see the result of
//! its previous action. Only the most recent `window` entries are kept.

use std::collections::VecDeque;

use deo_core::action::{ActionSpec, ExecutionOutcome};

/// Note appended when the model's output could not be parsed.
pub const INVALID_JSON_NOTE: &str = "Invalid JSON returned. Please retry with valid JSON format.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum HistoryEntry {
    Action { action: String, result: String },
    Note(String),
}

#[derive(Debug, Clone)]
pub struct ActionHistory {
    entries: VecDeque<HistoryEntry>,
    window: usize,
    notes_issued: usize,
}

impl ActionHistory {
    pub fn new(window: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            window: window.max(1),
            notes_issued: 0,
        }
    }

    pub fn record_action(&mut self, action: &ActionSpec, outcome: &ExecutionOutcome) {
        self.push(HistoryEntry::Action {
            action: action.to_json(),
            result: outcome.message.clone(),
        });
    }

    /// Append a corrective note after a parse failure.
    pub fn record_correction(&mut self, detail: &str) {
        self.notes_issued += 1;
        let note = if detail.is_empty() {
            INVALID_JSON_NOTE.to_string()
        } else {
            format!("{INVALID_JSON_NOTE} ({detail})")
        };
        self.push(HistoryEntry::Note(note));
    }

    /// Corrective notes issued this turn, including evicted ones.
    pub fn notes_issued(&self) -> usize {
        self.notes_issued
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                HistoryEntry::Action { action, result } => {
                    out.push_str(&format!("Assistant Action: {action}\nSystem Result: {result}\n"));
                }
                HistoryEntry::Note(note) => {
                    out.push_str(&format!("System: {note}\n"));
                }
            }
        }
        out
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }
}
