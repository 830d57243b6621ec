use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::api::{Project, ProjectData, ProjectInfo, Provider, Release, ReleaseNote, Webhook};
use crate::db::DbClient;
use crate::gateway::{Broadcaster, GatewayError};

pub(crate) const TEST_API_KEY: &str = "test-key";

#[derive(Default)]
pub(crate) struct FakeInner {
    pub(crate) projects: Vec<Project>,
    pub(crate) releases: Vec<(Provider, String, Release)>,
    pub(crate) notes: Vec<(String, ReleaseNote)>,
    pub(crate) webhooks: Vec<Webhook>,
    pub(crate) requests: Vec<String>,
    pub(crate) keys: Vec<String>,
    pub(crate) fail_updates: bool,
    pub(crate) reject_creates: bool,
    next_id: u32,
}

/// In-process stand-in for the NewReleases API, served on an ephemeral port.
#[derive(Clone, Default)]
pub(crate) struct FakeReleaseService {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeReleaseService {
    pub(crate) fn lock(&self) -> MutexGuard<'_, FakeInner> {
        self.inner.lock().expect("fake service lock poisoned")
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub(crate) fn project(&self, provider: Provider, name: &str) -> Option<Project> {
        self.lock()
            .projects
            .iter()
            .find(|project| project.provider == provider && project.name == name)
            .cloned()
    }

    pub(crate) fn insert_project(&self, provider: Provider, name: &str, webhooks: &[&str]) {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("p{}", inner.next_id);
        inner.projects.push(Project {
            id,
            url: format!("https://example.com/{provider}/{name}"),
            provider,
            name: name.to_string(),
            info: ProjectInfo {
                webhooks: Some(webhooks.iter().map(ToString::to_string).collect()),
                ..ProjectInfo::default()
            },
        });
    }

    pub(crate) fn insert_release(&self, provider: Provider, name: &str, version: &str, date: &str) {
        self.lock().releases.push((
            provider,
            name.to_string(),
            Release {
                version: version.to_string(),
                date: date.to_string(),
                has_note: None,
            },
        ));
    }

    pub(crate) fn insert_webhook(&self, id: &str, name: &str) {
        self.lock().webhooks.push(Webhook {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Serves the fake and returns its `/v1` endpoint.
    pub(crate) async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake service");
        let address = listener.local_addr().expect("fake service address");
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake service");
        });
        format!("http://{address}/v1")
    }
}

async fn handle(
    State(service): State<FakeReleaseService>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut inner = service.lock();
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    inner.requests.push(format!("{method} {target}"));
    if let Some(key) = headers.get("X-Key").and_then(|value| value.to_str().ok()) {
        inner.keys.push(key.to_string());
    }

    let segments = uri
        .path()
        .trim_start_matches("/v1/")
        .split('/')
        .map(|segment| {
            urlencoding::decode(segment)
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect::<Vec<_>>();
    let segments = segments.iter().map(String::as_str).collect::<Vec<_>>();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["providers"]) => json(serde_json::json!({
            "providers": ["github", "npm", "sourcehut"]
        })),
        ("GET", ["webhooks"]) => json(serde_json::json!({ "webhooks": inner.webhooks })),
        ("GET", ["projects"]) => json(serde_json::json!({
            "projects": inner.projects,
            "total_pages": 1
        })),
        ("POST", ["projects"]) => create_project(&mut inner, &body),
        ("GET", ["projects", provider]) => {
            let projects = inner
                .projects
                .iter()
                .filter(|project| project.provider.as_str() == *provider)
                .cloned()
                .collect::<Vec<_>>();
            json(serde_json::json!({ "projects": projects, "total_pages": 1 }))
        }
        ("DELETE", ["projects", id]) => {
            let before = inner.projects.len();
            inner.projects.retain(|project| project.id != *id);
            if inner.projects.len() == before {
                return StatusCode::NOT_FOUND.into_response();
            }
            json(serde_json::json!({ "deleted": id }))
        }
        (method, ["projects", provider, rest @ ..]) => {
            project_resource(&mut inner, method, provider, rest, &body)
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn project_resource(
    inner: &mut FakeInner,
    method: &str,
    provider: &str,
    rest: &[&str],
    body: &[u8],
) -> Response {
    match (method, rest) {
        ("GET", [name @ .., "latest-release"]) => releases_for(inner, provider, &name.join("/"))
            .last()
            .map_or_else(|| StatusCode::NOT_FOUND.into_response(), json),
        ("GET", [name @ .., "releases", version, "note"]) => {
            if find_project(inner, provider, &name.join("/")).is_none() {
                return StatusCode::NOT_FOUND.into_response();
            }
            inner
                .notes
                .iter()
                .find(|(noted, _)| noted.as_str() == *version)
                .map_or_else(
                    || StatusCode::NOT_FOUND.into_response(),
                    |(_, note)| json(note),
                )
        }
        ("GET", [name @ .., "releases", version]) => releases_for(inner, provider, &name.join("/"))
            .into_iter()
            .find(|release| release.version == *version)
            .map_or_else(|| StatusCode::NOT_FOUND.into_response(), |release| json(&release)),
        ("GET", [name @ .., "releases"]) => {
            let mut releases = releases_for(inner, provider, &name.join("/"));
            releases.reverse();
            json(serde_json::json!({ "releases": releases, "total_pages": 1 }))
        }
        ("GET", name) => find_project(inner, provider, &name.join("/")).map_or_else(
            || StatusCode::NOT_FOUND.into_response(),
            json,
        ),
        ("POST", name) => update_project(inner, provider, &name.join("/"), body),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn create_project(inner: &mut FakeInner, body: &[u8]) -> Response {
    if inner.reject_creates {
        return (StatusCode::BAD_REQUEST, "project rejected").into_response();
    }
    let Ok(data) = serde_json::from_slice::<ProjectData>(body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    inner.next_id += 1;
    let project = Project {
        id: format!("p{}", inner.next_id),
        url: format!("https://example.com/{}/{}", data.provider, data.name),
        provider: data.provider,
        name: data.name,
        info: data.info,
    };
    inner.projects.push(project.clone());
    json(&project)
}

fn update_project(inner: &mut FakeInner, provider: &str, name: &str, body: &[u8]) -> Response {
    if inner.fail_updates {
        return (StatusCode::INTERNAL_SERVER_ERROR, "update failed").into_response();
    }
    let Ok(info) = serde_json::from_slice::<ProjectInfo>(body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(project) = inner
        .projects
        .iter_mut()
        .find(|project| project.provider.as_str() == provider && project.name == name)
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if info.webhooks.is_some() {
        project.info.webhooks = info.webhooks;
    }
    if info.note.is_some() {
        project.info.note = info.note;
    }
    if info.tags.is_some() {
        project.info.tags = info.tags;
    }
    json(&*project)
}

fn find_project<'a>(inner: &'a FakeInner, provider: &str, name: &str) -> Option<&'a Project> {
    inner
        .projects
        .iter()
        .find(|project| project.provider.as_str() == provider && project.name == name)
}

fn releases_for(inner: &FakeInner, provider: &str, name: &str) -> Vec<Release> {
    inner
        .releases
        .iter()
        .filter(|(owner, project, _)| owner.as_str() == provider && project == name)
        .map(|(_, _, release)| release.clone())
        .collect()
}

fn json<T: serde::Serialize>(value: T) -> Response {
    Json(value).into_response()
}

/// Gateway double that records every broadcast and can be told to fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    pub(crate) sent: Mutex<Vec<(Vec<String>, String)>>,
    pub(crate) fail: bool,
}

impl RecordingGateway {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<(Vec<String>, String)> {
        self.sent.lock().expect("gateway lock poisoned").clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingGateway {
    async fn broadcast(&self, channels: &[String], message: &str) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .expect("gateway lock poisoned")
            .push((channels.to_vec(), message.to_string()));
        if self.fail {
            return Err(GatewayError::Rejected("gateway offline".to_string()));
        }
        Ok(())
    }
}

pub(crate) async fn temp_db() -> DbClient {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let db_path = tempdir.path().join("subscriptions.db");
    // Each test owns its directory; leak it so the file outlives pooled connections.
    std::mem::forget(tempdir);

    DbClient::initialize(&db_path.to_string_lossy())
        .await
        .expect("db init")
}
