//! Page-context collectors
//!
//! Read and write the live state of a page: the cookies visible to its
//! origin and its key/value storage areas.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use keepsake_snapshot::{normalize_domain, Cookie, StorageData};

use crate::error::RouterError;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageArea {
    /// Persistent per-origin storage
    #[default]
    Local,
    /// Storage scoped to the page's session
    Session,
}

/// Page a request is aimed at, as sent by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTarget {
    pub url: String,
}

/// A resolved page: its origin and the domain its snapshots file under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub origin: String,
    pub domain: String,
}

impl Page {
    pub fn resolve(target: &PageTarget) -> Result<Self> {
        let url =
            Url::parse(&target.url).map_err(|_| RouterError::InvalidPage(target.url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RouterError::InvalidPage(target.url.clone()));
        }

        let domain = normalize_domain(url.as_str())?;
        Ok(Self {
            origin: url.origin().ascii_serialization(),
            domain,
        })
    }
}

pub trait PageCollector: Send + Sync {
    /// All cookies visible to `origin`
    fn cookies(&self, origin: &str) -> Result<Vec<Cookie>>;

    /// Write `cookies` for `origin`, dropping existing ones first when
    /// `replace` is set.
    fn set_cookies(&self, origin: &str, cookies: &[Cookie], replace: bool) -> Result<()>;

    fn read_storage(&self, origin: &str, area: StorageArea) -> Result<StorageData>;

    fn write_storage(
        &self,
        origin: &str,
        area: StorageArea,
        items: &StorageData,
        clear_first: bool,
    ) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
struct PageState {
    cookies: Vec<Cookie>,
    storage: HashMap<StorageArea, StorageData>,
}

/// In-process page state keyed by origin
#[derive(Default)]
pub struct MemoryPages {
    pages: Arc<RwLock<HashMap<String, PageState>>>,
}

impl MemoryPages {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clone for MemoryPages {
    fn clone(&self) -> Self {
        Self {
            pages: Arc::clone(&self.pages),
        }
    }
}

impl PageCollector for MemoryPages {
    fn cookies(&self, origin: &str) -> Result<Vec<Cookie>> {
        Ok(self
            .pages
            .read()
            .get(origin)
            .map(|page| page.cookies.clone())
            .unwrap_or_default())
    }

    fn set_cookies(&self, origin: &str, cookies: &[Cookie], replace: bool) -> Result<()> {
        let mut pages = self.pages.write();
        let page = pages.entry(origin.to_string()).or_default();
        if replace {
            page.cookies.clear();
        }
        for cookie in cookies {
            page.cookies
                .retain(|c| !(c.name == cookie.name && c.path == cookie.path && c.domain == cookie.domain));
            page.cookies.push(cookie.clone());
        }
        Ok(())
    }

    fn read_storage(&self, origin: &str, area: StorageArea) -> Result<StorageData> {
        Ok(self
            .pages
            .read()
            .get(origin)
            .and_then(|page| page.storage.get(&area).cloned())
            .unwrap_or_default())
    }

    fn write_storage(
        &self,
        origin: &str,
        area: StorageArea,
        items: &StorageData,
        clear_first: bool,
    ) -> Result<()> {
        let mut pages = self.pages.write();
        let storage = pages
            .entry(origin.to_string())
            .or_default()
            .storage
            .entry(area)
            .or_default();
        if clear_first {
            storage.clear();
        }
        for (key, value) in items {
            storage.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_page() {
        let page = Page::resolve(&PageTarget {
            url: "https://App.Example.com:8443/dashboard?x=1".to_string(),
        })
        .unwrap();

        assert_eq!(page.origin, "https://app.example.com:8443");
        assert_eq!(page.domain, "app.example.com:8443");
    }

    #[test]
    fn test_resolve_rejects_non_web_pages() {
        for url in ["chrome://settings", "not a url", "file:///tmp/a.html"] {
            assert!(Page::resolve(&PageTarget { url: url.to_string() }).is_err());
        }
    }

    #[test]
    fn test_storage_areas_are_separate() {
        let pages = MemoryPages::new();
        let items = json!({"theme": "dark"}).as_object().cloned().unwrap();

        pages
            .write_storage("https://a.com", StorageArea::Local, &items, false)
            .unwrap();

        assert_eq!(pages.read_storage("https://a.com", StorageArea::Local).unwrap(), items);
        assert!(pages
            .read_storage("https://a.com", StorageArea::Session)
            .unwrap()
            .is_empty());
        assert!(pages
            .read_storage("https://b.com", StorageArea::Local)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_write_storage_merge_or_clear() {
        let pages = MemoryPages::new();
        let first = json!({"a": 1}).as_object().cloned().unwrap();
        let second = json!({"b": 2}).as_object().cloned().unwrap();

        pages.write_storage("o", StorageArea::Local, &first, false).unwrap();
        pages.write_storage("o", StorageArea::Local, &second, false).unwrap();
        assert_eq!(pages.read_storage("o", StorageArea::Local).unwrap().len(), 2);

        pages.write_storage("o", StorageArea::Local, &second, true).unwrap();
        assert_eq!(pages.read_storage("o", StorageArea::Local).unwrap(), second);
    }

    #[test]
    fn test_set_cookies_replaces_same_name() {
        let pages = MemoryPages::new();

        pages.set_cookies("o", &[Cookie::new("sid", "1")], false).unwrap();
        pages.set_cookies("o", &[Cookie::new("sid", "2")], false).unwrap();

        let cookies = pages.cookies("o").unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "2");

        pages.set_cookies("o", &[Cookie::new("other", "x")], true).unwrap();
        let names: Vec<String> = pages.cookies("o").unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["other"]);
    }
}
