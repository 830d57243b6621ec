use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nr_bridge::api::{Provider, ReleaseClient};
use nr_bridge::commands::CommandContext;
use nr_bridge::config::BridgeConfig;
use nr_bridge::db::ChannelRef;
use nr_bridge::webhook;

#[derive(Debug, Parser)]
#[command(name = "nr-bridge")]
#[command(about = "NewReleases notification bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct Channel {
    /// Chat platform the channel lives on.
    #[arg(long)]
    platform: String,

    /// Platform-specific channel id.
    #[arg(long = "channel")]
    channel_id: String,
}

impl Channel {
    fn to_ref(&self) -> ChannelRef {
        ChannelRef::new(&self.platform, &self.channel_id)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the release webhook.
    Serve,
    /// Show the latest or a specific release of a project.
    Info {
        name: String,
        #[arg(short, long)]
        provider: Option<String>,
        #[arg(short, long)]
        version: Option<String>,
        /// List the first page of releases instead.
        #[arg(short, long)]
        list: bool,
    },
    /// Show a release note.
    Note {
        name: String,
        #[arg(default_value = "")]
        version: String,
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Subscribe a channel to a project.
    Watch {
        name: String,
        #[arg(short, long)]
        provider: Option<String>,
        #[command(flatten)]
        channel: Channel,
    },
    /// Unsubscribe a channel from a project.
    Unwatch {
        name: String,
        #[arg(short, long)]
        provider: Option<String>,
        #[command(flatten)]
        channel: Channel,
    },
    /// List the projects a channel watches.
    Subscriptions {
        #[command(flatten)]
        channel: Channel,
    },
    /// List providers known to the release service.
    Providers,
    /// List tracked projects.
    Projects {
        #[arg(short, long)]
        provider: Option<Provider>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::load()?;

    let reply = match cli.command {
        Command::Serve => return webhook::run(&config).await,
        Command::Providers => {
            let client = ReleaseClient::new(&config.api_endpoint(), &config.api_key()?)?;
            client.get_providers().await?.providers.join("\n")
        }
        Command::Projects { provider, page } => {
            let client = ReleaseClient::new(&config.api_endpoint(), &config.api_key()?)?;
            let list = match provider {
                Some(provider) => client.list_projects_by_provider(provider, page).await?,
                None => client.list_projects(page).await?,
            };
            let mut lines = list
                .projects
                .iter()
                .map(|project| format!("{}/{} ({})", project.provider, project.name, project.id))
                .collect::<Vec<_>>();
            lines.push(format!("page {page} of {}", list.total_pages.max(1)));
            lines.join("\n")
        }
        Command::Info {
            name,
            provider,
            version,
            list,
        } => {
            CommandContext::from_config(&config)
                .await?
                .info(provider.as_deref(), &name, version.as_deref(), list)
                .await?
        }
        Command::Note {
            name,
            version,
            provider,
        } => {
            CommandContext::from_config(&config)
                .await?
                .note(provider.as_deref(), &name, &version)
                .await?
        }
        Command::Watch {
            name,
            provider,
            channel,
        } => {
            CommandContext::from_config(&config)
                .await?
                .watch(&channel.to_ref(), provider.as_deref(), &name)
                .await?
        }
        Command::Unwatch {
            name,
            provider,
            channel,
        } => {
            CommandContext::from_config(&config)
                .await?
                .unwatch(&channel.to_ref(), provider.as_deref(), &name)
                .await?
        }
        Command::Subscriptions { channel } => {
            CommandContext::from_config(&config)
                .await?
                .subscriptions(&channel.to_ref())
                .await?
        }
    };

    println!("{reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn watch_parses_channel_and_provider() {
        let cli = Cli::try_parse_from([
            "nr-bridge",
            "watch",
            "koishijs/koishi",
            "--provider",
            "github",
            "--platform",
            "discord",
            "--channel",
            "1",
        ])
        .expect("parse");

        let Command::Watch {
            name,
            provider,
            channel,
        } = cli.command
        else {
            panic!("expected watch");
        };
        assert_eq!(name, "koishijs/koishi");
        assert_eq!(provider.as_deref(), Some("github"));
        assert_eq!(channel.to_ref(), ChannelRef::new("discord", "1"));
    }

    #[test]
    fn note_version_defaults_to_latest_and_projects_parses_provider() {
        let cli = Cli::try_parse_from(["nr-bridge", "note", "serde"]).expect("parse note");
        assert!(matches!(cli.command, Command::Note { ref version, .. } if version.is_empty()));

        let cli = Cli::try_parse_from(["nr-bridge", "projects", "-p", "cargo", "--page", "3"])
            .expect("parse projects");
        assert!(matches!(
            cli.command,
            Command::Projects {
                provider: Some(Provider::Cargo),
                page: 3
            }
        ));

        assert!(Cli::try_parse_from(["nr-bridge", "projects", "-p", "sourcehut"]).is_err());
        assert!(Cli::try_parse_from(["nr-bridge", "subscriptions", "--platform", "qq"]).is_err());
    }
}
