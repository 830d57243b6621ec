use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source-code and package hosts tracked by NewReleases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Artifacthub,
    Bitbucket,
    Cargo,
    Codeberg,
    Cpan,
    DebianGitlab,
    Dockerhub,
    EcrPublic,
    Exozyme,
    FreedesktopGitlab,
    Gcr,
    Gems,
    Ghcr,
    Gitea,
    Github,
    GithubNpm,
    Gitlab,
    GnomeGitlab,
    GnuSavannah,
    Hex,
    KdeGitlab,
    Maven,
    Npm,
    Nuget,
    Packagist,
    Pypi,
    Quay,
    Sourceforge,
    XfceGitlab,
    Yarn,
}

impl Provider {
    pub const ALL: [Self; 30] = [
        Self::Artifacthub,
        Self::Bitbucket,
        Self::Cargo,
        Self::Codeberg,
        Self::Cpan,
        Self::DebianGitlab,
        Self::Dockerhub,
        Self::EcrPublic,
        Self::Exozyme,
        Self::FreedesktopGitlab,
        Self::Gcr,
        Self::Gems,
        Self::Ghcr,
        Self::Gitea,
        Self::Github,
        Self::GithubNpm,
        Self::Gitlab,
        Self::GnomeGitlab,
        Self::GnuSavannah,
        Self::Hex,
        Self::KdeGitlab,
        Self::Maven,
        Self::Npm,
        Self::Nuget,
        Self::Packagist,
        Self::Pypi,
        Self::Quay,
        Self::Sourceforge,
        Self::XfceGitlab,
        Self::Yarn,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artifacthub => "artifacthub",
            Self::Bitbucket => "bitbucket",
            Self::Cargo => "cargo",
            Self::Codeberg => "codeberg",
            Self::Cpan => "cpan",
            Self::DebianGitlab => "debian-gitlab",
            Self::Dockerhub => "dockerhub",
            Self::EcrPublic => "ecr-public",
            Self::Exozyme => "exozyme",
            Self::FreedesktopGitlab => "freedesktop-gitlab",
            Self::Gcr => "gcr",
            Self::Gems => "gems",
            Self::Ghcr => "ghcr",
            Self::Gitea => "gitea",
            Self::Github => "github",
            Self::GithubNpm => "github-npm",
            Self::Gitlab => "gitlab",
            Self::GnomeGitlab => "gnome-gitlab",
            Self::GnuSavannah => "gnu-savannah",
            Self::Hex => "hex",
            Self::KdeGitlab => "kde-gitlab",
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::Nuget => "nuget",
            Self::Packagist => "packagist",
            Self::Pypi => "pypi",
            Self::Quay => "quay",
            Self::Sourceforge => "sourceforge",
            Self::XfceGitlab => "xfce-gitlab",
            Self::Yarn => "yarn",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == value)
            .ok_or_else(|| UnknownProvider(value.to_string()))
    }
}
