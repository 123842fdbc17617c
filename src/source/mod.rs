mod client;

pub use client::{PageMetadata, SourceClient, SourceNewsItem};
