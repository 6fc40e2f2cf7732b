use crate::api::{HttpMarketplaceClient, MarketplaceApi};
use crate::app::chat;
use crate::app::status::render_status;
use crate::chat::ChatController;
use crate::cli::{Cli, Commands, SessionCommands};
use crate::config::Config;
use crate::session::{SessionManager, SessionStore, SqliteSessionStore, UserType};
use crate::ui::{render, style};
use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::sync::Arc;
use tracing::info;

async fn open_store(config: &Config) -> Result<Arc<SqliteSessionStore>> {
    let path = config.store_path();
    let store = SqliteSessionStore::open(&path)
        .await
        .with_context(|| format!("Failed to open session store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn marketplace_client(config: &Config) -> Result<Arc<HttpMarketplaceClient>> {
    let client = HttpMarketplaceClient::new(&config.api).context("Invalid api.base_url")?;
    Ok(Arc::new(client))
}

async fn run_chat(config: &Config, user_type: UserType, resume: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;
    let api = marketplace_client(config)?;
    let sessions = SessionManager::new(store, config.chat.clone(), user_type);
    let restored = sessions.bootstrap(Some(user_type)).await?;
    info!(
        user_type = %user_type,
        restored,
        api = %api.base_url(),
        "starting chat"
    );

    let controller = ChatController::new(api, sessions);
    chat::run(controller, user_type, resume).await
}

async fn run_sessions(config: &Config, command: SessionCommands) -> Result<()> {
    let store = open_store(config).await?;
    match command {
        SessionCommands::List { user_type } => {
            let sessions = store.list_sessions(user_type).await?;
            if sessions.is_empty() {
                println!("{}", style::dim("No saved sessions."));
            }
            for session in &sessions {
                println!("{}", render::session_line(session, false));
            }
        }
        SessionCommands::Show { id } => {
            let session = store
                .get_session(&id)
                .await?
                .with_context(|| format!("Session {id} not found"))?;
            print!("{}", render::transcript(&session));
        }
        SessionCommands::Delete { id, yes } => {
            let Some(session) = store.get_session(&id).await? else {
                anyhow::bail!("Session {id} not found");
            };
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!(
                        "Delete \"{}\" and its {} messages?",
                        session.name,
                        session.messages.len()
                    ))
                    .default(false)
                    .interact()?;
            if confirmed && store.delete_session(&id).await? {
                println!("{}", style::success(format!("Deleted {id}")));
            } else {
                println!("{}", style::dim("Nothing deleted."));
            }
        }
    }
    Ok(())
}

async fn run_candidates(config: &Config, search: Option<&str>) -> Result<()> {
    let api = marketplace_client(config)?;
    let candidates = api.list_candidates(search).await?;
    if candidates.is_empty() {
        println!("{}", style::dim("No candidates found."));
    }
    for profile in &candidates {
        println!("{}", render::candidate(profile));
    }
    Ok(())
}

async fn run_history(config: &Config) -> Result<()> {
    let api = marketplace_client(config)?;
    let history = api.evaluation_history().await?;
    if history.is_empty() {
        println!("{}", style::dim("No saved evaluations yet."));
    }
    for session in &history {
        println!("{}\n", render::evaluation_session(session));
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Chat { user_type, session } => {
            let user_type = user_type.unwrap_or(config.default_user_type);
            run_chat(&config, user_type, session.as_deref()).await
        }
        Commands::Sessions { session_command } => run_sessions(&config, session_command).await,
        Commands::Candidates { search } => run_candidates(&config, search.as_deref()).await,
        Commands::History => run_history(&config).await,
        Commands::Status => {
            println!("{}", render_status(&config));
            Ok(())
        }
    }
}
