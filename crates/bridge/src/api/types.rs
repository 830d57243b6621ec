use serde::{Deserialize, Serialize};

use super::Provider;

/// Mutable project attributes, sent as a partial update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhooks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectData {
    pub provider: Provider,
    pub name: String,
    #[serde(flatten)]
    pub info: ProjectInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    pub url: String,
    pub provider: Provider,
    pub name: String,
    #[serde(flatten)]
    pub info: ProjectInfo,
}

impl Project {
    #[must_use]
    pub fn has_webhook(&self, webhook_id: &str) -> bool {
        self.info
            .webhooks
            .as_deref()
            .is_some_and(|ids| ids.iter().any(|id| id == webhook_id))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    pub version: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_note: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReleaseList {
    pub releases: Vec<Release>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseNote {
    pub title: String,
    pub message: String,
    pub url: String,
}

/// Provider names as reported by the service; kept as strings so entries the
/// compiled-in enum does not know about can still be listed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderList {
    pub providers: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Webhook {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookList {
    pub webhooks: Vec<Webhook>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_decodes_flattened_info() {
        let json = r#"{
  "id": "abc",
  "url": "https://github.com/koishijs/koishi",
  "provider": "github",
  "name": "koishijs/koishi",
  "webhooks": ["hook-1"],
  "tags": ["bot"]
}"#;

        let project = serde_json::from_str::<Project>(json).expect("deserialize");
        assert_eq!(project.provider, Provider::Github);
        assert!(project.has_webhook("hook-1"));
        assert!(!project.has_webhook("hook-2"));
        assert_eq!(project.info.note, None);
        assert_eq!(project.info.tags.as_deref(), Some(&["bot".to_string()][..]));
    }

    #[test]
    fn project_data_omits_absent_info_fields() {
        let data = ProjectData {
            provider: Provider::Cargo,
            name: "serde".to_string(),
            info: ProjectInfo::default(),
        };

        let value = serde_json::to_value(&data).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({ "provider": "cargo", "name": "serde" })
        );
    }

    #[test]
    fn release_list_defaults_missing_paging() {
        let list = serde_json::from_str::<ReleaseList>(
            r#"{"releases": [{"version": "1.0.0", "date": "2024-01-01T00:00:00Z"}]}"#,
        )
        .expect("deserialize");
        assert_eq!(list.total_pages, 0);
        assert_eq!(list.releases[0].has_note, None);
    }
}
