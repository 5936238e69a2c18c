// Second-pass reranking over broad retrieval candidates
pub mod scorer;

pub use scorer::{select_top, Reranker};
