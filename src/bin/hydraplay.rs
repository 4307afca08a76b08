use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use hydraplay::player::{format_position, MopidyPlayer, PlayerConnection};
use hydraplay::{BusMessage, ClientId, Config, GroupId, NoticeLevel, Session, StreamId, Topic, Volume};

#[derive(Parser, Debug)]
#[command(name = "hydraplay")]
#[command(about = "Control Snapcast zones and the Mopidy players feeding them", long_about = None)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, env = "HYDRAPLAY_CONFIG")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show groups, clients and what each player is doing
    Status,
    /// Set one client's volume
    Volume {
        client: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
        #[arg(long)]
        mute: bool,
    },
    /// Move a group's volume, keeping its clients' relative loudness
    GroupVolume {
        group: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Switch a group to another stream
    SetStream { group: String, stream: String },
    /// Rename a client
    Rename { client: String, name: String },
    Play(PlayerOpts),
    Pause(PlayerOpts),
    Resume(PlayerOpts),
    Next(PlayerOpts),
    Previous(PlayerOpts),
    Toggle(PlayerOpts),
    /// Search the player's library
    Search {
        #[command(flatten)]
        player: PlayerOpts,
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List the player's playlists
    Playlists(PlayerOpts),
    /// Append a playlist to the player's tracklist
    Queue {
        #[command(flatten)]
        player: PlayerOpts,
        uri: String,
    },
    /// Show the player's tracklist
    Tracklist(PlayerOpts),
    /// Print bus events until a connection is lost
    Watch,
    /// Print the effective configuration
    Config,
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(clap::Args, Debug)]
struct PlayerOpts {
    #[arg(long)]
    player: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "hydraplay", &mut std::io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let session = Session::start(&config).await?;

    match cli.command {
        Commands::Status => run_status(&session),
        Commands::Volume { client, percent, mute } => {
            let volume = session
                .snapcast
                .set_volume(&ClientId::from(client.as_str()), Volume::new(percent, mute))
                .await?;
            println!("{}: {}%{}", client, volume.percent, if volume.muted { " (muted)" } else { "" });
        }
        Commands::GroupVolume { group, percent } => {
            let result = session
                .set_group_volume(&GroupId::from(group.as_str()), f64::from(percent))
                .await?;
            for (client, volume) in &result.applied {
                println!("  {}: {}%", client, volume.percent);
            }
            for (client, error) in &result.failures {
                println!("  {}: failed ({})", client, error);
            }
            println!("{}/{} client(s) updated", result.success, result.total);
        }
        Commands::SetStream { group, stream } => {
            let stream = session
                .snapcast
                .set_stream(&GroupId::from(group.as_str()), &StreamId::from(stream))
                .await?;
            println!("{} now plays {}", group, stream);
        }
        Commands::Rename { client, name } => {
            let name = session
                .snapcast
                .set_client_name(&ClientId::from(client.as_str()), &name)
                .await?;
            println!("{} renamed to {}", client, name);
        }
        Commands::Play(opts) => player(&session, &opts)?.play(None).await?,
        Commands::Pause(opts) => player(&session, &opts)?.pause().await?,
        Commands::Resume(opts) => player(&session, &opts)?.resume().await?,
        Commands::Next(opts) => player(&session, &opts)?.next().await?,
        Commands::Previous(opts) => player(&session, &opts)?.previous().await?,
        Commands::Toggle(opts) => {
            let state = player(&session, &opts)?.toggle().await?;
            println!("{}: {}", opts.player, state);
        }
        Commands::Search { player: opts, query } => {
            let tracks = player(&session, &opts)?.search(&query.join(" ")).await?;
            for track in &tracks {
                println!("{}  {} - {}", track.uri, track.artist_names(), track.name);
            }
            println!("{} track(s)", tracks.len());
        }
        Commands::Playlists(opts) => {
            for playlist in player(&session, &opts)?.playlists().await? {
                println!("{}  {}", playlist.uri, playlist.name);
            }
        }
        Commands::Queue { player: opts, uri } => {
            let added = player(&session, &opts)?.append_playlist(&uri).await?;
            println!("{} track(s) added", added.len());
        }
        Commands::Tracklist(opts) => {
            let player = player(&session, &opts)?;
            let current = player.current_tl_track().await?.map(|t| t.tlid);
            for tl_track in player.tracklist().await? {
                let marker = if Some(tl_track.tlid) == current { ">" } else { " " };
                let length = tl_track.track.length.map(format_position).unwrap_or_default();
                println!(
                    "{} {:>4}  {} - {}  {}",
                    marker,
                    tl_track.tlid,
                    tl_track.track.artist_names(),
                    tl_track.track.name,
                    length
                );
            }
        }
        Commands::Watch => run_watch(&session).await,
        Commands::Config | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn player(session: &Session, opts: &PlayerOpts) -> Result<std::sync::Arc<MopidyPlayer>> {
    Ok(session.player(&StreamId::from(opts.player.as_str()))?)
}

fn run_status(session: &Session) {
    for group in session.zones.groups() {
        let name = if group.name.is_empty() { group.id.as_str() } else { group.name.as_str() };
        println!(
            "{} [{}] stream={} average={:.0}%{}",
            name,
            group.id,
            group.stream_id,
            group.average_volume(),
            if group.muted { " (muted)" } else { "" }
        );
        for client in &group.clients {
            println!(
                "  {:<20} {:>3}%{}{}",
                client.display_name(),
                client.config.volume.percent,
                if client.config.volume.muted { " muted" } else { "" },
                if client.connected { "" } else { " (offline)" }
            );
        }
    }

    for id in session.players.ids() {
        if let Ok(player) = session.player(id) {
            let state = player.current_state();
            println!(
                "{} {}: {} - {} ({}){}",
                id,
                state.playback_state,
                state.artist,
                state.title,
                state.album,
                if player.is_connected() { "" } else { " [offline]" }
            );
        }
    }
}

async fn run_watch(session: &Session) {
    let mut events = futures::stream::select_all([
        session.bus.subscribe(Topic::Snapcast),
        session.bus.subscribe(Topic::Mopidy),
        session.bus.subscribe(Topic::Notice),
    ]);

    while let Some(message) = events.next().await {
        let now = jiff::Timestamp::now();
        match message {
            BusMessage::Snapcast(notification) => println!("{} snapcast {}", now, notification.method()),
            BusMessage::Mopidy { instance, event } => println!("{} {} {}", now, instance, event.name()),
            BusMessage::Notice(notice) => {
                println!("{} {:?}: {}", now, notice.level, notice.message);
                if notice.level == NoticeLevel::Error {
                    break;
                }
            }
        }
    }
}
