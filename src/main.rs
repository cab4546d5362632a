use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence::channels::TelegramChannel;
use cadence::config::Config;
use cadence::docs::auth::GoogleAuth;
use cadence::docs::{DocumentApi, DocumentLog, GoogleDocsClient};
use cadence::llm::{AnthropicProvider, Oracle};
use cadence::scheduler::Scheduler;
use cadence::session::ConversationController;

#[derive(Parser, Debug)]
#[command(name = "cadence", about = "Accountability coach bot", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot: message loop plus scheduled triggers (default)
    Run,
    /// Send the daily check-in prompt now and exit
    Daily,
    /// Build and send the weekly recap now and exit
    Weekly,
    /// Send the stretch reminder now and exit
    Stretch,
    /// Verify configuration and connectivity, then exit
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let app = App::build(&config).context("failed to build application")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => app.run().await,
        Commands::Daily => Ok(app.controller.send_daily_prompt().await?),
        Commands::Weekly => Ok(app.controller.send_weekly_recap().await?),
        Commands::Stretch => Ok(app.controller.send_stretch_check(true).await?),
        Commands::Status => app.status().await,
    }
}

struct App {
    channel: Arc<TelegramChannel>,
    oracle: Arc<AnthropicProvider>,
    controller: Arc<ConversationController>,
    scheduler: Scheduler,
    log: Arc<DocumentLog>,
    stretch_log: Arc<DocumentLog>,
}

impl App {
    fn build(config: &Config) -> Result<Self> {
        let auth = Arc::new(
            GoogleAuth::from_key_file(&config.docs.credentials_path)
                .context("failed to load google credentials")?,
        );
        let docs_api: Arc<dyn DocumentApi> = Arc::new(GoogleDocsClient::new(auth));
        let log = Arc::new(DocumentLog::new(
            docs_api.clone(),
            config.docs.log_doc_id.clone(),
            config.retry.clone(),
        ));
        let stretch_log = Arc::new(DocumentLog::new(
            docs_api,
            config.docs.stretch_doc_id.clone(),
            config.retry.clone(),
        ));

        let channel = Arc::new(TelegramChannel::new(&config.telegram));
        let oracle = Arc::new(AnthropicProvider::new(config.anthropic.clone()));

        let controller = Arc::new(ConversationController::new(
            channel.clone(),
            oracle.clone(),
            log.clone(),
            stretch_log.clone(),
            config.retry.clone(),
            config.schedule.clone(),
        ));
        let scheduler =
            Scheduler::from_config(&config.schedule).context("invalid schedule configuration")?;

        Ok(Self {
            channel,
            oracle,
            controller,
            scheduler,
            log,
            stretch_log,
        })
    }

    /// Message loop plus scheduler, until ctrl-c.
    async fn run(self) -> Result<()> {
        let username = self
            .channel
            .check_connection()
            .await
            .context("telegram connection check failed")?;
        tracing::info!(bot = %username, model = self.oracle.model_name(), "cadence starting");

        let scheduler_handle = tokio::spawn(self.scheduler.run(self.controller.clone()));

        let poll_loop = async {
            loop {
                match self.channel.poll_messages().await {
                    Ok(messages) => {
                        for message in messages {
                            self.controller.handle_message(&message.text).await;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "poll failed, backing off");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        };

        tokio::select! {
            _ = poll_loop => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
            }
        }

        scheduler_handle.abort();
        Ok(())
    }

    /// One-shot health report for the configured integrations.
    async fn status(&self) -> Result<()> {
        println!("log document:     {}", self.log.doc_url());
        println!("stretch document: {}", self.stretch_log.doc_url());
        println!("model:            {}", self.oracle.model_name());

        match self.channel.check_connection().await {
            Ok(username) => println!("telegram:         ok (@{username})"),
            Err(error) => println!("telegram:         FAILED ({error})"),
        }
        match self.oracle.check_connection().await {
            Ok(()) => println!("anthropic:        ok"),
            Err(error) => println!("anthropic:        FAILED ({error})"),
        }
        match self.log.read_recent_daily(1).await.len() {
            0 => println!("log entries:      none found"),
            n => println!("log entries:      most recent {n} readable"),
        }
        Ok(())
    }
}
