mod summarizer;

pub use summarizer::{GeneratedShort, Summarizer};
