use tracing::{info, warn};

use crate::api::{ApiError, Project, ProjectData, ProjectInfo, Provider, ReleaseClient};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("project name is required")]
    NameRequired,
    #[error("unsupported provider: {0}")]
    InvalidProvider(String),
    #[error("project {provider}/{name} not found")]
    NotFound { provider: Provider, name: String },
}

/// Checks user input without touching the network. Names are lowercased.
///
/// # Errors
/// Returns [`ResolveError::NameRequired`] or [`ResolveError::InvalidProvider`].
pub fn validate(provider: &str, name: &str) -> Result<(Provider, String), ResolveError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ResolveError::NameRequired);
    }

    let provider = provider
        .trim()
        .parse::<Provider>()
        .map_err(|_| ResolveError::InvalidProvider(provider.to_string()))?;

    Ok((provider, name.to_lowercase()))
}

/// Returns the tracked project, creating it on the service when it is untracked.
///
/// # Errors
/// Returns a [`ResolveError`] for invalid input or when the project cannot be
/// fetched or created.
pub async fn resolve_project(
    client: &ReleaseClient,
    provider: &str,
    name: &str,
) -> Result<Project, ResolveError> {
    let (provider, name) = validate(provider, name)?;

    if let Some(project) = absent_on_error(client.get_project(provider, &name).await, "lookup") {
        return Ok(project);
    }

    let data = ProjectData {
        provider,
        name: name.clone(),
        info: ProjectInfo::default(),
    };
    match absent_on_error(client.add_project(&data).await, "create") {
        Some(project) => {
            info!(%provider, name = %project.name, id = %project.id, "tracking new project");
            Ok(project)
        }
        None => Err(ResolveError::NotFound { provider, name }),
    }
}

fn absent_on_error(result: Result<Project, ApiError>, operation: &str) -> Option<Project> {
    match result {
        Ok(project) => Some(project),
        Err(ApiError::NotFound) => None,
        Err(error) => {
            warn!(%error, operation, "release service project call failed");
            None
        }
    }
}
