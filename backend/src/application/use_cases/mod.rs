pub mod search;

pub use search::SimilaritySearcher;
