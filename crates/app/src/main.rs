use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use recitation_sync_core::{
    resolve_start_time_for_word, resolve_word_at_time, word_index_to_number, AlignmentStore,
    ClipOutput, PlaybackClock, StaticWordSource, SyncConfig, SyncError, SyncSession, VersePlayer,
    WordAudioPlayer, WordAudioUrlBuilder,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> recitation_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = Arc::new(AlignmentStore::from_config(&config.alignment));

    match cli.command {
        Commands::Resolve { verse, at_ms } => run_resolve(&store, &verse, at_ms).await,
        Commands::Seek { verse, word } => run_seek(&store, &verse, word).await,
        Commands::Simulate { verse, step_ms } => {
            run_simulate(&config, store, &verse, step_ms).await
        }
    }
}

fn load_config(cli: &Cli) -> recitation_sync_core::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.alignment.data_dir = dir.clone();
    }
    Ok(config)
}

async fn run_resolve(
    store: &AlignmentStore,
    target: &VerseArgs,
    at_ms: u64,
) -> recitation_sync_core::Result<()> {
    let alignment = require_alignment(store, target).await?;
    match word_index_to_number(resolve_word_at_time(&alignment, at_ms)) {
        Some(word) => println!("{word}"),
        None => println!("-"),
    }
    Ok(())
}

async fn run_seek(
    store: &AlignmentStore,
    target: &VerseArgs,
    word: usize,
) -> recitation_sync_core::Result<()> {
    let alignment = require_alignment(store, target).await?;
    match resolve_start_time_for_word(&alignment, word) {
        Some(seconds) => println!("{seconds:.3}"),
        None => {
            tracing::warn!(word, "word does not start a timed segment");
            println!("-");
        }
    }
    Ok(())
}

async fn run_simulate(
    config: &SyncConfig,
    store: Arc<AlignmentStore>,
    target: &VerseArgs,
    step_ms: u64,
) -> recitation_sync_core::Result<()> {
    let alignment = require_alignment(&store, target).await?;
    let end_secs = alignment
        .segments
        .last()
        .map(|segment| segment.end_ms as f64 / 1000.0)
        .unwrap_or_default();

    let player = Arc::new(VersePlayer::new(store.clone()));
    let session = SyncSession::new(
        store,
        Arc::new(WordAudioPlayer::new(Arc::new(SilentOutput))),
        player.clone(),
        Arc::new(StaticWordSource::new()),
        WordAudioUrlBuilder::from_config(&config.word_audio),
    );

    let highlighter = session.mount_verse(target.chapter, target.verse).await;
    highlighter.on_highlight_change(|word| tracing::info!(?word, "highlight"));

    player.start_verse(&target.reciter, target.chapter, target.verse);
    let step = step_ms.max(1) as f64 / 1000.0;
    let mut clock = PlaybackClock::default();
    while clock.time_seconds <= end_secs + step {
        player.advance(&mut clock, step).await;
    }
    player.stop();

    tracing::info!(seconds = clock.time_seconds, "simulation finished");
    Ok(())
}

async fn require_alignment(
    store: &AlignmentStore,
    target: &VerseArgs,
) -> recitation_sync_core::Result<recitation_sync_core::VerseAlignment> {
    store.load_alignment(&target.reciter).await?;
    store
        .verse_alignment(&target.reciter, target.chapter, target.verse)
        .await
        .ok_or_else(|| {
            SyncError::msg(format!(
                "reciter `{}` has no timing for {}:{}",
                target.reciter, target.chapter, target.verse
            ))
        })
}

/// Clip output for headless runs; word clips are only logged.
struct SilentOutput;

#[async_trait]
impl ClipOutput for SilentOutput {
    async fn start(&self, url: &str) -> recitation_sync_core::Result<()> {
        tracing::info!(url, "word clip");
        Ok(())
    }

    fn pause(&self) {}

    fn halt(&self) {}
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Word-level recitation sync tools", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding alignment JSON files; overrides the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct VerseArgs {
    /// Reciter edition id, e.g. `ar.alafasy`.
    #[arg(short, long)]
    reciter: String,
    #[arg(short, long)]
    chapter: u32,
    #[arg(short, long)]
    verse: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the word number recited at a position.
    Resolve {
        #[command(flatten)]
        verse: VerseArgs,
        /// Playback position in milliseconds.
        #[arg(long)]
        at_ms: u64,
    },
    /// Print the seek time, in seconds, for a word number.
    Seek {
        #[command(flatten)]
        verse: VerseArgs,
        #[arg(short, long)]
        word: usize,
    },
    /// Play a verse through the reference player and log highlight changes.
    Simulate {
        #[command(flatten)]
        verse: VerseArgs,
        #[arg(long, default_value_t = 50)]
        step_ms: u64,
    },
}
