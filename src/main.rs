use dotenv::dotenv;
use serenity::all::{ClientBuilder, GatewayIntents};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use soundclip::commands::{
    general::ping::*,
    music::{
        clear::*,
        leave::*,
        mi::*,
        queue::*,
        utils::{
            audio_fetcher::HttpAudioFetcher, instants::InstantsClient,
            music_manager::MusicManager, queue_manager::AudioQueueManager,
            songbird_transport::SongbirdTransport,
        },
    },
};
use soundclip::config::Config;
use soundclip::{CommandResult, Context, Data, Error, HTTP_CLIENT};

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soundclip=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;
    info!("Effective configuration: {}", config.redacted_json());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let commands = vec![
        // Default commands
        register(),
        help(),
        // General commands
        ping(),
        // Sound clip commands
        mi(),
        clear(),
        queue(),
        leave(),
    ];

    let playback = config.playback;
    let search = config.search.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Logged in as {}", ready.user.name);

                let songbird = MusicManager::get_songbird(ctx).await?;
                let transport = Arc::new(SongbirdTransport::new(songbird, ctx.cache.clone()));
                let fetcher = Arc::new(HttpAudioFetcher::new(
                    HTTP_CLIENT.clone(),
                    playback.fetch_timeout,
                    playback.max_clip_bytes,
                ));

                Ok(Data {
                    audio_queue: AudioQueueManager::new(transport, fetcher, playback),
                    instants: InstantsClient::new(HTTP_CLIENT.clone(), &search)?,
                })
            })
        });

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework.build())
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping shards");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Failed to listen for the shutdown signal: {}", e),
        }
    });

    client.start().await.map_err(Into::into)
}
