//! Token-prefix search for Speakerbob.
//!
//! Free text is split into lowercase alphanumeric tokens by [`tokenize`] and
//! written into a [`SearchIndex`], a byte-wise prefix trie mapping every
//! token prefix to the set of record ids indexed under it.
//!
//! # Key Types
//!
//! - [`SearchIndex`] -- the prefix trie (write, prefix search, pruning delete)
//! - [`tokenize`] -- text to ordered lowercase tokens

mod node;
pub mod tokenizer;
pub mod trie;

pub use tokenizer::tokenize;
pub use trie::SearchIndex;
