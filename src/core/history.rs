use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::core::state::HistoryItem;

/// Append-only record of completed idea workflows.
///
/// Shared between workflows behind an `Arc`. Items keep arrival order and
/// are never modified once appended.
#[derive(Debug, Default)]
pub struct History {
    items: Mutex<Vec<HistoryItem>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryItem>> {
        // A poisoned lock still holds a consistent Vec: pushes are atomic.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, item: HistoryItem) {
        let mut items = self.lock();
        items.push(item);
        log::info!("History now holds {} item(s)", items.len());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn items(&self) -> Vec<HistoryItem> {
        self.lock().clone()
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&*self.lock())?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{Duration, FinalizedScript, Genre, Idea, SeoContent};
    use std::sync::Arc;

    fn item(title: &str) -> HistoryItem {
        HistoryItem {
            idea: Idea {
                title: title.to_string(),
                concept: "c".to_string(),
                story_arc: "a".to_string(),
                genre: Genre::Comedy,
                duration: Duration::Seconds30,
            },
            script: FinalizedScript {
                json: "[]".to_string(),
                scenes: vec![],
            },
            seo: SeoContent {
                title: title.to_string(),
                description: String::new(),
                tags: vec![],
            },
        }
    }

    #[test]
    fn test_append_keeps_order() {
        let history = History::new();
        assert!(history.is_empty());
        history.append(item("first"));
        history.append(item("second"));

        let titles: Vec<String> = history.items().into_iter().map(|i| i.idea.title).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let history = Arc::new(History::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let history = history.clone();
            handles.push(tokio::spawn(async move {
                history.append(item(&format!("idea {}", i)));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(history.len(), 8);
    }

    #[test]
    fn test_export_writes_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out").join("history.json");
        let history = History::new();
        history.append(item("exported"));
        history.export(&path)?;

        let loaded: Vec<HistoryItem> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].seo.title, "exported");
        Ok(())
    }
}
