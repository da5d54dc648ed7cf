//! Text normalization shared by indexing and querying.
//!
//! Built on tantivy's analyzer pipeline so that the exact same rules apply to
//! chunk text and query text: split on non-alphanumerics, drop overlong
//! tokens, lowercase, and optionally remove English stop words.
use localsearch_core::config::TokenizerConfig;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

const MAX_TOKEN_BYTES: usize = 40;

pub const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

#[derive(Clone)]
pub struct Normalizer {
	analyzer: TextAnalyzer,
	config: TokenizerConfig,
}

impl Normalizer {
	pub fn new(config: TokenizerConfig) -> Self {
		let analyzer = if config.remove_stop_words {
			TextAnalyzer::builder(SimpleTokenizer::default())
				.filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
				.filter(LowerCaser)
				.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
				.build()
		} else {
			TextAnalyzer::builder(SimpleTokenizer::default())
				.filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
				.filter(LowerCaser)
				.build()
		};
		Self { analyzer, config }
	}

	pub fn config(&self) -> &TokenizerConfig { &self.config }

	/// Token sequence for `text`; pure and locale independent.
	pub fn normalize(&self, text: &str) -> Vec<String> {
		// token_stream needs exclusive access; analyzers are cheap to clone.
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() { tokens.push(stream.token().text.clone()); }
		tokens
	}
}

impl Default for Normalizer {
	fn default() -> Self { Self::new(TokenizerConfig::default()) }
}

/// Convenience for one-off calls with the default rules.
pub fn normalize(text: &str) -> Vec<String> { Normalizer::default().normalize(text) }
