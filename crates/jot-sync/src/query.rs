use serde::{Deserialize, Serialize};
use std::fmt;

/// The filter tuple describing one requested slice of notes.
///
/// Field order is fixed, so the serialized form (and therefore the cache key)
/// is the same however the query was assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    pub in_trash: bool,
    pub category_id: Option<String>,
    pub tag_id: Option<String>,
    pub is_starred: bool,
    pub is_shared: bool,
    pub search_query: Option<String>,
    pub exclude_category: Option<String>,
    pub view_mode: Option<ViewMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Grid,
    List,
}

impl ViewMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(Self::Grid),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A load request: the view plus operational flags that do not affect the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub query: ViewQuery,
    pub force_refresh: bool,
    pub note_id_to_remove: Option<String>,
}

impl LoadOptions {
    pub fn new(query: ViewQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn removing(mut self, note_id: impl Into<String>) -> Self {
        self.note_id_to_remove = Some(note_id.into());
        self
    }
}

/// Mutually exclusive view types, in endpoint-selection priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ViewKind {
    Trash,
    Category(String),
    Tag(String),
    Starred,
    Shared,
    Search(String),
    All,
}

impl ViewQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn trash() -> Self {
        Self {
            in_trash: true,
            ..Self::default()
        }
    }

    pub fn starred() -> Self {
        Self {
            is_starred: true,
            ..Self::default()
        }
    }

    pub fn shared() -> Self {
        Self {
            is_shared: true,
            ..Self::default()
        }
    }

    pub fn category(category_id: impl Into<String>) -> Self {
        Self {
            category_id: Some(category_id.into()),
            ..Self::default()
        }
    }

    pub fn tag(tag_id: impl Into<String>) -> Self {
        Self {
            tag_id: Some(tag_id.into()),
            ..Self::default()
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self {
            search_query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = Some(mode);
        self
    }

    /// Drops placeholder ids and blank strings left over from form inputs.
    pub fn normalized(mut self) -> Self {
        self.category_id = clean_id(self.category_id);
        self.tag_id = clean_id(self.tag_id);
        self.exclude_category = clean_id(self.exclude_category);
        self.search_query = self
            .search_query
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty());
        self
    }

    pub fn kind(&self) -> ViewKind {
        if self.in_trash {
            ViewKind::Trash
        } else if let Some(category_id) = &self.category_id {
            ViewKind::Category(category_id.clone())
        } else if let Some(tag_id) = &self.tag_id {
            ViewKind::Tag(tag_id.clone())
        } else if self.is_starred {
            ViewKind::Starred
        } else if self.is_shared {
            ViewKind::Shared
        } else if let Some(search) = &self.search_query {
            ViewKind::Search(search.clone())
        } else {
            ViewKind::All
        }
    }

    /// Views whose selection implies a boolean flag on every returned note.
    pub fn is_assertive(&self) -> bool {
        self.in_trash || self.is_starred || self.is_shared
    }
}

impl ViewKind {
    pub fn title(&self) -> String {
        match self {
            Self::Trash => "Trash".to_string(),
            Self::Category(id) => format!("Category {id}"),
            Self::Tag(id) => format!("Tag {id}"),
            Self::Starred => "Starred".to_string(),
            Self::Shared => "Shared".to_string(),
            Self::Search(query) => format!("Search \"{query}\""),
            Self::All => "All notes".to_string(),
        }
    }

    pub fn empty_message(&self) -> String {
        match self {
            Self::Trash => "Trash is empty".to_string(),
            Self::Category(_) => "No notes in this category".to_string(),
            Self::Tag(_) => "No notes with this tag".to_string(),
            Self::Starred => "No starred notes".to_string(),
            Self::Shared => "No shared notes".to_string(),
            Self::Search(query) => format!("No notes match \"{query}\""),
            Self::All => "No notes yet".to_string(),
        }
    }

    pub fn error_message(&self) -> String {
        match self {
            Self::All => "Failed to load notes".to_string(),
            other => format!("Failed to load {}", other.title().to_lowercase()),
        }
    }
}

fn clean_id(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != "null" && value != "undefined")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_ids_normalize_to_none() {
        let query = ViewQuery {
            category_id: Some("null".to_string()),
            tag_id: Some("undefined".to_string()),
            search_query: Some("   ".to_string()),
            ..ViewQuery::default()
        }
        .normalized();

        assert_eq!(query, ViewQuery::all());
        assert_eq!(query.kind(), ViewKind::All);
    }

    #[test]
    fn kind_follows_priority_order() {
        let query = ViewQuery {
            in_trash: true,
            category_id: Some("c".to_string()),
            is_starred: true,
            ..ViewQuery::default()
        };
        assert_eq!(query.kind(), ViewKind::Trash);

        let query = ViewQuery {
            tag_id: Some("t".to_string()),
            is_starred: true,
            search_query: Some("q".to_string()),
            ..ViewQuery::default()
        };
        assert_eq!(query.kind(), ViewKind::Tag("t".to_string()));
        assert!(query.is_assertive());
    }

    #[test]
    fn labels_read_naturally() {
        assert_eq!(ViewKind::Trash.empty_message(), "Trash is empty");
        assert_eq!(ViewKind::Starred.error_message(), "Failed to load starred");
        assert_eq!(ViewKind::All.error_message(), "Failed to load notes");
    }
}
