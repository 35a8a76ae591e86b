//! Wire records returned by the media server.
//!
//! Every field except the identifying ones is optional; mapping into store
//! rows decides what is required.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub id: Option<String>,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub operating_system: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserPolicy {
    pub is_administrator: bool,
    pub is_disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoteUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub policy: Option<UserPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageTags {
    pub primary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoteLibrary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub collection_type: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub image_tags: Option<ImageTags>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaSource {
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoteItem {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub media_type: Option<String>,
    pub parent_id: Option<String>,
    /// .NET ticks, 10 000 000 per second.
    pub run_time_ticks: Option<i64>,
    pub media_sources: Option<Vec<MediaSource>>,
    pub date_created: Option<String>,
}

/// Activity log ids arrive as numbers or numeric strings depending on the
/// server version.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActivityLogEntry {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub short_overview: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub item_id: Option<String>,
    pub user_id: Option<String>,
    /// RFC 3339 string or an epoch number; see the mappers.
    pub date: Option<serde_json::Value>,
    pub severity: Option<String>,
}

/// Paged envelope used by `/Items` and the activity log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_record_count: Option<u64>,
    #[serde(default)]
    pub start_index: Option<u64>,
}

/// `/Library/MediaFolders` returns either the envelope or a bare list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrQuery<T> {
    Query(QueryResult<T>),
    List(Vec<T>),
}

impl<T> ListOrQuery<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListOrQuery::Query(q) => q.items,
            ListOrQuery::List(items) => items,
        }
    }
}

/// Parameters of one activity log page request.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLogQuery {
    pub start_index: u64,
    pub limit: u64,
    pub has_user_id: bool,
    /// Epoch seconds; only entries at or after this instant.
    pub min_date: Option<i64>,
}

impl ActivityLogQuery {
    pub fn new(limit: u64) -> Self {
        Self {
            start_index: 0,
            limit,
            has_user_id: true,
            min_date: None,
        }
    }

    pub fn since(mut self, min_date: Option<i64>) -> Self {
        self.min_date = min_date;
        self
    }
}

/// Item count of one library, as shown on overview screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteLibraryStats {
    pub library_id: String,
    pub ok: bool,
    pub item_count: u64,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_entry_accepts_text_ids() {
        let entry: ActivityLogEntry = serde_json::from_value(json!({
            "Id": "42",
            "Type": "VideoPlaybackStopped",
            "UserId": "u1",
            "ItemId": "i1",
            "Date": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(entry.id, Some(42));
        assert_eq!(entry.kind.as_deref(), Some("VideoPlaybackStopped"));

        let numeric: ActivityLogEntry = serde_json::from_value(json!({ "Id": 7 })).unwrap();
        assert_eq!(numeric.id, Some(7));

        let garbage: ActivityLogEntry = serde_json::from_value(json!({ "Id": "x" })).unwrap();
        assert_eq!(garbage.id, None);
    }

    #[test]
    fn libraries_decode_from_list_or_envelope() {
        let envelope: ListOrQuery<RemoteLibrary> = serde_json::from_value(json!({
            "Items": [{ "Id": "a", "Name": "Movies", "CollectionType": "movies" }],
            "TotalRecordCount": 1
        }))
        .unwrap();
        assert_eq!(envelope.into_items().len(), 1);

        let list: ListOrQuery<RemoteLibrary> =
            serde_json::from_value(json!([{ "Id": "a" }, { "Id": "b" }])).unwrap();
        assert_eq!(list.into_items().len(), 2);
    }

    #[test]
    fn user_policy_is_optional() {
        let user: RemoteUser =
            serde_json::from_value(json!({ "Id": "u1", "Name": "Alice" })).unwrap();
        assert!(user.policy.is_none());

        let admin: RemoteUser = serde_json::from_value(json!({
            "Id": "u2",
            "Name": "Root",
            "Policy": { "IsAdministrator": true }
        }))
        .unwrap();
        assert!(admin.policy.unwrap().is_administrator);
    }
}
