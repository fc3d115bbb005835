use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// Every kind of portfolio content. Lists hold many ordered documents;
/// sections hold at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    Experiences,
    Certificates,
    TechStack,
    About,
    Hero,
    Contact,
}

impl Collection {
    pub const LISTS: [Collection; 4] = [
        Collection::Projects,
        Collection::Experiences,
        Collection::Certificates,
        Collection::TechStack,
    ];
    pub const SECTIONS: [Collection; 3] = [Collection::About, Collection::Hero, Collection::Contact];

    /// URL segment and value of the `collection` column.
    pub fn slug(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Experiences => "experiences",
            Collection::Certificates => "certificates",
            Collection::TechStack => "tech-stack",
            Collection::About => "about",
            Collection::Hero => "hero",
            Collection::Contact => "contact",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Collection::Projects => "Project",
            Collection::Experiences => "Experience",
            Collection::Certificates => "Certificate",
            Collection::TechStack => "Tech stack item",
            Collection::About => "About section",
            Collection::Hero => "Hero section",
            Collection::Contact => "Contact section",
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ContentRow {
    pub id: Uuid,
    pub data: Json<Map<String, Value>>,
    pub sort_order: i32,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A content document as served: type-specific fields flattened next to the
/// shared ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub data: Map<String, Value>,
    pub order: i32,
    pub is_published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<ContentRow> for ContentItem {
    fn from(r: ContentRow) -> Self {
        Self {
            id: r.id,
            data: r.data.0,
            order: r.sort_order,
            is_published: r.is_published,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// Keys the server owns; ignored when they appear in a request body.
const SERVER_KEYS: [&str; 4] = ["id", "_id", "createdAt", "updatedAt"];

/// Fields parsed out of a create/update body. `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentDraft {
    pub data: Map<String, Value>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

impl ContentDraft {
    pub fn from_body(body: Value) -> Result<Self, AppError> {
        let Value::Object(mut data) = body else {
            return Err(AppError::validation("Request body must be a JSON object"));
        };
        for key in SERVER_KEYS {
            data.remove(key);
        }

        let order = match data.remove("order") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| AppError::validation("order must be an integer"))?,
            ),
        };
        let is_published = match data.remove("isPublished") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(b),
            Some(_) => return Err(AppError::validation("isPublished must be a boolean")),
        };

        Ok(Self {
            data,
            order,
            is_published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_splits_shared_fields_from_document() {
        let draft = ContentDraft::from_body(json!({
            "_id": "abc",
            "createdAt": "yesterday",
            "title": "Portfolio",
            "technologies": ["Rust", "Postgres"],
            "order": 3,
            "isPublished": false
        }))
        .unwrap();
        assert_eq!(draft.order, Some(3));
        assert_eq!(draft.is_published, Some(false));
        assert_eq!(draft.data.len(), 2);
        assert_eq!(draft.data["title"], "Portfolio");
    }

    #[test]
    fn draft_rejects_non_objects_and_bad_types() {
        assert!(ContentDraft::from_body(json!(["a"])).is_err());
        assert!(ContentDraft::from_body(json!({"order": "first"})).is_err());
        assert!(ContentDraft::from_body(json!({"order": 1.5})).is_err());
        assert!(ContentDraft::from_body(json!({"isPublished": "yes"})).is_err());
    }

    #[test]
    fn item_serializes_flat() {
        let mut data = Map::new();
        data.insert("name".into(), json!("Rust"));
        data.insert("level".into(), json!(90));
        let now = OffsetDateTime::now_utc();
        let item = ContentItem {
            id: Uuid::new_v4(),
            data,
            order: 1,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["name"], "Rust");
        assert_eq!(v["level"], 90);
        assert_eq!(v["order"], 1);
        assert_eq!(v["isPublished"], true);
        assert!(v.get("data").is_none());
    }

    #[test]
    fn slugs_are_unique() {
        let mut slugs: Vec<_> = Collection::LISTS
            .iter()
            .chain(Collection::SECTIONS.iter())
            .map(|c| c.slug())
            .collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 7);
    }
}
