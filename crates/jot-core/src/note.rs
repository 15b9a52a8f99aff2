use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical note shape used everywhere past the ingestion boundary.
///
/// Payloads arriving from the server (or from older persisted snapshots) may
/// carry `_id` instead of `id`, `isStarred`/`isShared` instead of
/// `starred`/`shared`, and a populated category object instead of a plain id.
/// Deserialization always goes through [`Note::try_from`], which folds all of
/// those into one shape. Fields this layer does not reason about are kept in
/// `extra` so a note survives a round trip through the local mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub in_trash: bool,
    pub starred: bool,
    pub shared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The three tag representations the server has used over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Tags {
    Ids(Vec<String>),
    Refs(Vec<TagRef>),
    Single(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Note {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            content: String::new(),
            in_trash: false,
            starred: false,
            shared: false,
            share_type: None,
            category_id: None,
            tags: None,
            tag_id: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn in_trash(mut self, in_trash: bool) -> Self {
        self.in_trash = in_trash;
        self
    }

    pub fn starred(mut self, starred: bool) -> Self {
        self.starred = starred;
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Tag membership across every supported representation.
    ///
    /// An array-valued `tags` field is authoritative even when empty; the
    /// scalar `tagId` field is only consulted when `tags` is absent.
    pub fn has_tag(&self, tag_id: &str) -> bool {
        match &self.tags {
            Some(Tags::Ids(ids)) => ids.iter().any(|id| id == tag_id),
            Some(Tags::Refs(refs)) => refs.iter().any(|tag| tag.id == tag_id),
            Some(Tags::Single(id)) => id == tag_id,
            None => self.tag_id.as_deref() == Some(tag_id),
        }
    }
}

impl TryFrom<Value> for Note {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err("note payload must be a JSON object".to_string());
        };

        let id = take_identifier(&mut map)
            .ok_or_else(|| "note payload has neither `id` nor `_id`".to_string())?;

        let starred = take_flag(&mut map, "starred") | take_flag(&mut map, "isStarred");
        let shared = take_flag(&mut map, "shared") | take_flag(&mut map, "isShared");
        let in_trash = take_flag(&mut map, "inTrash");

        let category_id = map.remove("categoryId").and_then(reference_id);
        let tags = map.remove("tags").and_then(parse_tags);
        let tag_id = map.remove("tagId").and_then(reference_id);

        Ok(Self {
            id,
            title: take_string(&mut map, "title").unwrap_or_default(),
            content: take_string(&mut map, "content").unwrap_or_default(),
            in_trash,
            starred,
            shared,
            share_type: take_string(&mut map, "shareType"),
            category_id,
            tags,
            tag_id,
            created_at: take_string(&mut map, "createdAt"),
            updated_at: take_string(&mut map, "updatedAt"),
            deleted_at: take_string(&mut map, "deletedAt"),
            extra: map,
        })
    }
}

/// Lenient ingestion: payloads that cannot be turned into a note are dropped.
pub fn normalize_note_value(value: Value) -> Option<Note> {
    Note::try_from(value).ok()
}

fn take_identifier(map: &mut Map<String, Value>) -> Option<String> {
    let id = map.remove("id").and_then(scalar_string);
    let legacy = map.remove("_id").and_then(scalar_string);
    id.or(legacy).filter(|value| !value.is_empty())
}

fn take_flag(map: &mut Map<String, Value>, key: &str) -> bool {
    match map.remove(key) {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(raw)) => raw.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(value)) => Some(value),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Accepts a plain id or a populated `{id|_id, ...}` object.
fn reference_id(value: Value) -> Option<String> {
    match value {
        Value::Object(mut map) => take_identifier(&mut map),
        other => scalar_string(other).filter(|value| !value.is_empty()),
    }
}

fn parse_tags(value: Value) -> Option<Tags> {
    match value {
        Value::Array(items) => {
            if items.first().is_some_and(Value::is_object) {
                let refs = items
                    .into_iter()
                    .filter_map(|item| {
                        let Value::Object(mut map) = item else {
                            return None;
                        };
                        let id = take_identifier(&mut map)?;
                        let name = take_string(&mut map, "name");
                        Some(TagRef { id, name })
                    })
                    .collect();
                Some(Tags::Refs(refs))
            } else {
                Some(Tags::Ids(
                    items.into_iter().filter_map(scalar_string).collect(),
                ))
            }
        }
        Value::String(id) => Some(Tags::Single(id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_identifier_becomes_canonical_id() {
        let note: Note = serde_json::from_value(json!({"_id": "x", "title": "t"})).expect("note");
        assert_eq!(note.id, "x");
        assert_eq!(note.title, "t");

        let encoded = serde_json::to_value(&note).expect("encode");
        assert_eq!(encoded["id"], "x");
        assert!(encoded.get("_id").is_none());
    }

    #[test]
    fn alias_flags_fold_into_canonical_fields() {
        let note: Note = serde_json::from_value(json!({
            "id": "n1",
            "isStarred": true,
            "isShared": true,
            "inTrash": "true",
            "categoryId": {"_id": "c1", "name": "Work"}
        }))
        .expect("note");

        assert!(note.starred);
        assert!(note.shared);
        assert!(note.in_trash);
        assert_eq!(note.category_id.as_deref(), Some("c1"));
        assert!(note.extra.is_empty());
    }

    #[test]
    fn tag_membership_covers_every_representation() {
        let ids: Note =
            serde_json::from_value(json!({"id": "a", "tags": ["t1", "t2"]})).expect("ids");
        let refs: Note = serde_json::from_value(json!({"id": "b", "tags": [{"_id": "t1"}]}))
            .expect("refs");
        let single: Note = serde_json::from_value(json!({"id": "c", "tags": "t1"})).expect("one");
        let scalar: Note = serde_json::from_value(json!({"id": "d", "tagId": "t1"})).expect("tag");
        let empty: Note =
            serde_json::from_value(json!({"id": "e", "tags": [], "tagId": "t1"})).expect("empty");

        assert!(ids.has_tag("t2"));
        assert!(refs.has_tag("t1"));
        assert!(single.has_tag("t1"));
        assert!(scalar.has_tag("t1"));
        assert!(!empty.has_tag("t1"));
        assert!(!ids.has_tag("t9"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let original = json!({"id": "n1", "fileName": "n1_123", "tags": [{"id": "t", "name": "T"}]});
        let note: Note = serde_json::from_value(original).expect("note");
        let encoded = serde_json::to_value(&note).expect("encode");
        let decoded: Note = serde_json::from_value(encoded).expect("decode");

        assert_eq!(decoded, note);
        assert_eq!(decoded.extra.get("fileName"), Some(&json!("n1_123")));
    }

    #[test]
    fn payload_without_identifier_is_rejected() {
        assert!(normalize_note_value(json!({"title": "orphan"})).is_none());
        assert!(normalize_note_value(json!("not an object")).is_none());
    }
}
