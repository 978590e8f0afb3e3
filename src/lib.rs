pub mod bookmarks;
pub mod cli;
pub mod config;
pub mod metadata;
pub mod scrape;
pub mod web;

#[cfg(test)]
mod tests;

pub use metadata::{get_bookmark_metadata, BookmarkMetadata, MetadataExtractor, RequestProfile};
