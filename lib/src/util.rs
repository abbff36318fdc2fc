pub mod combinator;
pub mod tokio;
