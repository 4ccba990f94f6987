//! Guideline retrieval for triage: query composition, expansion, reranking and caching.

pub mod cache;
pub mod expansion;
pub mod query_builder;
pub mod retrieval;

pub use cache::{CacheKey, RetrievalCache};
pub use expansion::{ExpandedQuery, QueryExpander};
pub use query_builder::NO_PRIOR_REPORTS;
pub use retrieval::{Retrieval, RetrievalEngine};
