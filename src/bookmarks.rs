use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::RwLock;

use crate::metadata::normalize::normalize_url;
use crate::metadata::MetadataExtractor;
use crate::scrape::headless::BrowserRenderer;

#[derive(Debug, Clone, Eq, Default, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: u64,

    pub title: String,
    pub url: String,

    pub favicon_url: Option<String>,
    pub og_image_url: Option<String>,
}

impl Hash for Bookmark {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Bookmark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// User input for a new bookmark. A supplied title wins over the extracted one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookmarkCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
}

/// A fully resolved bookmark, ready to be stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub favicon_url: Option<String>,
    pub og_image_url: Option<String>,
}

/// Persistence boundary. Real backends live outside this crate.
pub trait BookmarkStore: Send + Sync {
    fn create(&self, bookmark: NewBookmark) -> anyhow::Result<Bookmark>;
    fn get(&self, id: u64) -> anyhow::Result<Option<Bookmark>>;
    fn delete(&self, id: u64) -> anyhow::Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    list: RwLock<Vec<Bookmark>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.list.read().map(|list| list.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("bookmark store lock poisoned")
}

impl BookmarkStore for MemoryStore {
    fn create(&self, bookmark: NewBookmark) -> anyhow::Result<Bookmark> {
        let mut list = self.list.write().map_err(poisoned)?;
        let id = list.last().map(|last| last.id + 1).unwrap_or_default();

        let bmark = Bookmark {
            id,
            title: bookmark.title,
            url: bookmark.url,
            favicon_url: bookmark.favicon_url,
            og_image_url: bookmark.og_image_url,
        };
        list.push(bmark.clone());

        Ok(bmark)
    }

    fn get(&self, id: u64) -> anyhow::Result<Option<Bookmark>> {
        let list = self.list.read().map_err(poisoned)?;
        Ok(list.iter().find(|b| b.id == id).cloned())
    }

    fn delete(&self, id: u64) -> anyhow::Result<bool> {
        let mut list = self.list.write().map_err(poisoned)?;
        match list.iter().position(|b| b.id == id) {
            Some(idx) => {
                list.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Creates a bookmark, enriching it with page metadata. Extraction is
/// best-effort: an unreachable page still produces a bookmark.
pub async fn create_bookmark<S, R>(
    store: &S,
    extractor: &MetadataExtractor<R>,
    create: BookmarkCreate,
) -> anyhow::Result<Bookmark>
where
    S: BookmarkStore + ?Sized,
    R: BrowserRenderer,
{
    let url = normalize_url(&create.url);
    if url.is_empty() {
        anyhow::bail!("bookmark url is empty");
    }

    let meta = extractor.extract(&url).await;
    if meta.is_empty() {
        log::info!("{url}: creating bookmark without metadata");
    }

    let title = create
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or(meta.title);

    store.create(NewBookmark {
        title,
        url,
        favicon_url: meta.favicon_url,
        og_image_url: meta.og_image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_bookmark(url: &str) -> NewBookmark {
        NewBookmark {
            title: "t".into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_store_ids_increase() {
        let store = MemoryStore::new();
        let a = store.create(new_bookmark("https://a.example")).unwrap();
        let b = store.create(new_bookmark("https://b.example")).unwrap();
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_memory_store_get_delete() {
        let store = MemoryStore::new();
        let a = store.create(new_bookmark("https://a.example")).unwrap();
        assert_eq!(store.get(a.id).unwrap().unwrap().url, "https://a.example");
        assert!(store.delete(a.id).unwrap());
        assert!(!store.delete(a.id).unwrap());
        assert!(store.get(a.id).unwrap().is_none());
        assert!(store.is_empty());
    }
}
