//! Per-session state: mode, loaded document and conversation

use crate::conversation::ConversationState;
use quro_common::models::{Mode, ReferenceTable};
use quro_common::ExtractedDocument;
use std::path::PathBuf;

/// An uploaded document the session answers from
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Where the document was read from
    pub path: PathBuf,

    /// Full extracted text
    pub text: String,

    /// Numbered references found in the text
    pub references: ReferenceTable,
}

impl LoadedDocument {
    pub fn new(path: PathBuf, document: ExtractedDocument) -> Self {
        Self {
            path,
            text: document.text,
            references: document.references,
        }
    }
}

/// Where answers come from; document state exists only in document mode
#[derive(Debug, Clone)]
pub enum SessionMode {
    Corpus,
    Document(LoadedDocument),
}

/// State owned by one conversation
#[derive(Debug, Clone)]
pub struct Session {
    mode: SessionMode,
    conversation: ConversationState,
}

impl Session {
    /// New session in corpus mode
    pub fn new(history_capacity: usize) -> Self {
        Self {
            mode: SessionMode::Corpus,
            conversation: ConversationState::new(history_capacity),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.mode {
            SessionMode::Corpus => Mode::Corpus,
            SessionMode::Document(_) => Mode::Document,
        }
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        match &self.mode {
            SessionMode::Document(document) => Some(document),
            SessionMode::Corpus => None,
        }
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// Enter document mode, replacing any previous document
    pub fn load_document(&mut self, document: LoadedDocument) {
        self.mode = SessionMode::Document(document);
        self.conversation.clear();
    }

    /// Back to corpus mode; always succeeds
    pub fn reset_to_corpus(&mut self) {
        self.mode = SessionMode::Corpus;
        self.conversation.clear();
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }

    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.conversation.record_exchange(user, assistant);
    }
}
