//! Context tree module - the parsed, read-only view of a document
//!
//! Contexts are produced once by the external parser and never change
//! afterwards. A [`ContextTree`] can therefore be shared across workers
//! without locking.

use crate::ids::{ContextId, DocumentId};

/// Structural kind of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Whole-document root
    Document,
    /// Section of a document
    Section,
    /// Paragraph of text
    Paragraph,
    /// Tokenized sentence (the unit n-gram spaces operate on)
    Sentence,
    /// Table
    Table,
    /// Table cell
    Cell,
    /// Figure (image)
    Figure,
    /// Figure or table caption
    Caption,
}

impl ContextKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Document => "document",
            ContextKind::Section => "section",
            ContextKind::Paragraph => "paragraph",
            ContextKind::Sentence => "sentence",
            ContextKind::Table => "table",
            ContextKind::Cell => "cell",
            ContextKind::Figure => "figure",
            ContextKind::Caption => "caption",
        }
    }

    /// Parse a kind from a string (internal use)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "document" => Some(ContextKind::Document),
            "section" => Some(ContextKind::Section),
            "paragraph" => Some(ContextKind::Paragraph),
            "sentence" => Some(ContextKind::Sentence),
            "table" => Some(ContextKind::Table),
            "cell" => Some(ContextKind::Cell),
            "figure" => Some(ContextKind::Figure),
            "caption" => Some(ContextKind::Caption),
            _ => None,
        }
    }
}

impl std::str::FromStr for ContextKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid context kind: {}", s))
    }
}

/// A persisted document, identified by id and unique name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    /// Row id
    pub id: DocumentId,

    /// Unique document name
    pub name: String,
}

/// An addressable span of a document
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Row id
    pub id: ContextId,

    /// Owning document
    pub document_id: DocumentId,

    /// Parent context, `None` for roots
    pub parent: Option<ContextId>,

    /// Structural kind
    pub kind: ContextKind,

    /// Document-local order key
    pub position: u32,

    /// Corpus-unique identifier, stable across re-parses
    pub stable_id: String,

    /// Raw text of the context
    pub text: String,

    /// Tokens (sentences only)
    pub words: Vec<String>,

    /// Byte offset of each token into `text`
    pub char_offsets: Vec<usize>,

    /// Source url (figures only)
    pub url: Option<String>,
}

impl Context {
    /// Build the stable id for a context at `position` of `document`
    ///
    /// # Examples
    ///
    /// ```
    /// use sieve_domain::{Context, ContextKind};
    ///
    /// let id = Context::make_stable_id("112823", ContextKind::Sentence, 4);
    /// assert_eq!(id, "112823::sentence:4");
    /// ```
    pub fn make_stable_id(document: &str, kind: ContextKind, position: u32) -> String {
        format!("{}::{}:{}", document, kind.as_str(), position)
    }

    /// Byte range covered by the words `[word_start, word_end)`
    pub fn word_range(&self, word_start: usize, word_end: usize) -> Option<(usize, usize)> {
        if word_start >= word_end || word_end > self.words.len() {
            return None;
        }
        let start = *self.char_offsets.get(word_start)?;
        let last = word_end - 1;
        let end = self.char_offsets.get(last)? + self.words.get(last)?.len();
        Some((start, end))
    }
}

/// A context as handed over by the parser, before it has a row id
///
/// `parent` refers to the index of another draft in the same batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDraft {
    /// Structural kind
    pub kind: ContextKind,

    /// Index of the parent draft in the batch
    pub parent: Option<usize>,

    /// Raw text
    pub text: String,

    /// Tokens
    pub words: Vec<String>,

    /// Byte offset of each token into `text`
    pub char_offsets: Vec<usize>,

    /// Source url
    pub url: Option<String>,
}

impl ContextDraft {
    /// Create an untokenized draft
    pub fn new(kind: ContextKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            parent: None,
            text: text.into(),
            words: Vec::new(),
            char_offsets: Vec::new(),
            url: None,
        }
    }

    /// Create a sentence from tokens joined by single spaces
    ///
    /// # Examples
    ///
    /// ```
    /// use sieve_domain::ContextDraft;
    ///
    /// let s = ContextDraft::sentence(&["Storage", "temperature", "150"]);
    /// assert_eq!(s.text, "Storage temperature 150");
    /// assert_eq!(s.char_offsets, vec![0, 8, 20]);
    /// ```
    pub fn sentence(words: &[&str]) -> Self {
        let mut text = String::new();
        let mut char_offsets = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            char_offsets.push(text.len());
            text.push_str(word);
        }
        Self {
            kind: ContextKind::Sentence,
            parent: None,
            text,
            words: words.iter().map(|w| w.to_string()).collect(),
            char_offsets,
            url: None,
        }
    }

    /// Create a figure draft pointing at `url`
    pub fn figure(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(ContextKind::Figure, "")
        }
    }

    /// Attach this draft under the draft at index `parent`
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A document together with its contexts in position order
#[derive(Debug, Clone)]
pub struct ContextTree {
    document: DocumentRef,
    contexts: Vec<Context>,
}

impl ContextTree {
    /// Build a tree, ordering contexts by position
    pub fn new(document: DocumentRef, mut contexts: Vec<Context>) -> Self {
        contexts.sort_by_key(|c| (c.position, c.id));
        Self { document, contexts }
    }

    /// The owning document
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// All contexts in position order
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// Look up a context by id
    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id == id)
    }

    /// Contexts of the given kind, in position order
    pub fn of_kind(&self, kind: ContextKind) -> impl Iterator<Item = &Context> {
        self.contexts.iter().filter(move |c| c.kind == kind)
    }

    /// Sentences in position order
    pub fn sentences(&self) -> impl Iterator<Item = &Context> {
        self.of_kind(ContextKind::Sentence)
    }

    /// Figures in position order
    pub fn figures(&self) -> impl Iterator<Item = &Context> {
        self.of_kind(ContextKind::Figure)
    }

    /// Direct children of `id`
    pub fn children(&self, id: ContextId) -> impl Iterator<Item = &Context> {
        self.contexts.iter().filter(move |c| c.parent == Some(id))
    }

    /// Number of contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the document has no contexts
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
