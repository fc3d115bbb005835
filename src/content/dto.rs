use serde::Serialize;

use super::repo_types::ContentItem;

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<ContentItem>,
}

impl From<Vec<ContentItem>> for ListResponse {
    fn from(data: Vec<ContentItem>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Single document (or `null` for an empty section).
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<ContentItem>,
}

impl ItemResponse {
    pub fn new(data: Option<ContentItem>) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(data: ContentItem, message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
