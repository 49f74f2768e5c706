//! Generic mention spaces
//!
//! Domain-specific spaces live with the caller; these two cover the common
//! cases of word n-grams over sentences and whole figures.

use crate::error::ExtractorError;
use regex::Regex;
use sieve_domain::traits::MentionSpace;
use sieve_domain::{
    Context, ContextTree, PredicateError, TemporaryContext, TemporaryFigure, TemporarySpan,
};

/// Default characters single words are split on
pub const DEFAULT_SPLIT_TOKENS: [&str; 2] = ["-", "/"];

/// Every word n-gram of every sentence
///
/// Per sentence the n-grams are produced longest first, then left to right.
/// Single words containing a split token additionally yield the pieces
/// between the tokens, so `"65/150"` also produces `"65"` and `"150"`.
#[derive(Debug, Clone)]
pub struct NgramSpace {
    name: String,
    n_max: usize,
    split: Option<Regex>,
}

impl NgramSpace {
    /// N-grams up to `n_max` words, splitting on [`DEFAULT_SPLIT_TOKENS`]
    pub fn new(n_max: usize) -> Result<Self, ExtractorError> {
        Self::with_split_tokens(n_max, DEFAULT_SPLIT_TOKENS)
    }

    /// N-grams up to `n_max` words, splitting single words on `tokens`
    ///
    /// An empty token list disables splitting.
    pub fn with_split_tokens<I, S>(n_max: usize, tokens: I) -> Result<Self, ExtractorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if n_max == 0 {
            return Err(ExtractorError::Config(
                "n_max must be greater than 0".to_string(),
            ));
        }

        let alternatives: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect();
        let split = if alternatives.is_empty() {
            None
        } else {
            let pattern = alternatives.join("|");
            Some(Regex::new(&pattern).map_err(|e| {
                ExtractorError::Config(format!("invalid split tokens: {}", e))
            })?)
        };

        Ok(Self {
            name: format!("ngrams[1..={}]", n_max),
            n_max,
            split,
        })
    }

    /// Use `name` in logs and failure reports
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Longest n-gram produced
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    fn sentence_spans(&self, sentence: &Context) -> Vec<TemporaryContext> {
        let words = sentence.words.len();
        let mut spans = Vec::new();

        for len in (1..=self.n_max.min(words)).rev() {
            for start in 0..=(words - len) {
                if let Some(span) = TemporarySpan::from_words(sentence, start, start + len) {
                    spans.push(TemporaryContext::Span(span));
                }
                if len == 1 {
                    spans.extend(self.word_pieces(sentence, start));
                }
            }
        }

        spans
    }

    fn word_pieces(&self, sentence: &Context, word: usize) -> Vec<TemporaryContext> {
        let Some(split) = &self.split else {
            return Vec::new();
        };
        let Some((word_start, word_end)) = sentence.word_range(word, word + 1) else {
            return Vec::new();
        };
        let Some(text) = sentence.text.get(word_start..word_end) else {
            return Vec::new();
        };
        if !split.is_match(text) {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        let mut cursor = 0;
        for separator in split.find_iter(text) {
            if separator.start() > cursor {
                pieces.push((cursor, separator.start()));
            }
            cursor = separator.end();
        }
        if cursor < text.len() {
            pieces.push((cursor, text.len()));
        }

        pieces
            .into_iter()
            .filter_map(|(start, end)| {
                TemporarySpan::within_word(sentence, word, word_start + start, word_start + end)
            })
            .map(TemporaryContext::Span)
            .collect()
    }
}

impl MentionSpace for NgramSpace {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(
        &'a self,
        tree: &'a ContextTree,
    ) -> Result<Box<dyn Iterator<Item = TemporaryContext> + 'a>, PredicateError> {
        Ok(Box::new(
            tree.sentences()
                .flat_map(move |sentence| self.sentence_spans(sentence)),
        ))
    }
}

/// Every figure whose url has one of the given extensions
#[derive(Debug, Clone)]
pub struct FigureSpace {
    name: String,
    types: Vec<String>,
}

impl FigureSpace {
    /// Figures with any of the extensions in `types`; empty means all
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types: Vec<String> = types
            .into_iter()
            .map(|t| t.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let name = if types.is_empty() {
            "figures".to_string()
        } else {
            format!("figures[{}]", types.join(","))
        };
        Self { name, types }
    }

    /// Every figure
    pub fn all() -> Self {
        Self::new(Vec::<String>::new())
    }

    fn accepts(&self, url: Option<&str>) -> bool {
        if self.types.is_empty() {
            return true;
        }
        let Some(extension) = url.and_then(extension) else {
            return false;
        };
        self.types.iter().any(|t| *t == extension)
    }
}

/// Lowercased extension of the last path segment, ignoring query and fragment
fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

impl MentionSpace for FigureSpace {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(
        &'a self,
        tree: &'a ContextTree,
    ) -> Result<Box<dyn Iterator<Item = TemporaryContext> + 'a>, PredicateError> {
        Ok(Box::new(
            tree.figures()
                .filter(move |figure| self.accepts(figure.url.as_deref()))
                .map(|figure| TemporaryContext::Figure(TemporaryFigure::from_context(figure))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_domain::{ContextDraft, ContextId, ContextKind, DocumentId, DocumentRef};

    fn context(id: i64, position: u32, draft: ContextDraft) -> Context {
        Context {
            id: ContextId::from_value(id),
            document_id: DocumentId::from_value(1),
            parent: None,
            kind: draft.kind,
            position,
            stable_id: Context::make_stable_id("doc", draft.kind, position),
            text: draft.text,
            words: draft.words,
            char_offsets: draft.char_offsets,
            url: draft.url,
        }
    }

    fn tree(drafts: Vec<ContextDraft>) -> ContextTree {
        let contexts = drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| context(i as i64 + 1, i as u32, d))
            .collect();
        ContextTree::new(
            DocumentRef {
                id: DocumentId::from_value(1),
                name: "doc".to_string(),
            },
            contexts,
        )
    }

    fn texts(space: &dyn MentionSpace, tree: &ContextTree) -> Vec<String> {
        space
            .apply(tree)
            .unwrap()
            .map(|c| c.text().to_string())
            .collect()
    }

    #[test]
    fn test_ngrams_longest_first() {
        let tree = tree(vec![ContextDraft::sentence(&["max", "storage", "temp"])]);
        let space = NgramSpace::with_split_tokens(2, Vec::<String>::new()).unwrap();
        assert_eq!(
            texts(&space, &tree),
            vec!["max storage", "storage temp", "max", "storage", "temp"]
        );
    }

    #[test]
    fn test_ngrams_split_single_words() {
        let tree = tree(vec![ContextDraft::sentence(&["Tstg", "65/150", "C"])]);
        let space = NgramSpace::new(1).unwrap();
        assert_eq!(texts(&space, &tree), vec!["Tstg", "65/150", "65", "150", "C"]);

        let spans: Vec<TemporaryContext> = space.apply(&tree).unwrap().collect();
        let whole = spans[1].as_span().unwrap();
        let piece = spans[3].as_span().unwrap();
        assert!(whole.contains(piece));
        assert_eq!(piece.char_start, 8);
    }

    #[test]
    fn test_ngrams_skip_non_sentences() {
        let tree = tree(vec![
            ContextDraft::new(ContextKind::Document, "doc"),
            ContextDraft::figure("fig.png"),
            ContextDraft::sentence(&["a"]),
        ]);
        let space = NgramSpace::new(3).unwrap();
        assert_eq!(texts(&space, &tree), vec!["a"]);
    }

    #[test]
    fn test_ngrams_are_restartable() {
        let tree = tree(vec![ContextDraft::sentence(&["a", "b"])]);
        let space = NgramSpace::new(2).unwrap();
        assert_eq!(texts(&space, &tree), texts(&space, &tree));
    }

    #[test]
    fn test_zero_n_max_is_rejected() {
        assert!(matches!(NgramSpace::new(0), Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_figures_filtered_by_extension() {
        let tree = tree(vec![
            ContextDraft::figure("images/a.PNG"),
            ContextDraft::figure("images/b.jpg?size=2"),
            ContextDraft::figure("images/noext"),
        ]);
        assert_eq!(texts(&FigureSpace::new(["png"]), &tree), vec!["images/a.PNG"]);
        assert_eq!(
            texts(&FigureSpace::new([".jpg", "png"]), &tree),
            vec!["images/a.PNG", "images/b.jpg?size=2"]
        );
        assert_eq!(texts(&FigureSpace::all(), &tree).len(), 3);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/b/c.Png"), Some("png".to_string()));
        assert_eq!(extension("a/b.d/c"), None);
        assert_eq!(extension(".hidden"), None);
    }
}
