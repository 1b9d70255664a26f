use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use homeharmony::api;
use homeharmony::config::ConfigError;
use homeharmony::engine::ChangeSource;
use homeharmony::engine::DeviceStateStore;
use homeharmony::engine::Event;
use homeharmony::engine::StoreError;
use homeharmony::interpreter::Command;
use homeharmony::interpreter::CommandInterpreter;
use homeharmony::remote;
use homeharmony::view;
use homeharmony::voice::ConsoleSynthesizer;
use homeharmony::voice::LineRecognizer;
use homeharmony::voice::RecognitionOptions;
use homeharmony::voice::RecognizerFactory;
use homeharmony::voice::SpeechOutput;
use homeharmony::voice::SpeechRecognizer;
use homeharmony::voice::VoiceAdapter;
use homeharmony::voice::VoiceHandle;
use homeharmony::voice::VoiceStatus;
use homeharmony::Config;
use homeharmony::RoomFilter;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "homeharmony", version, about = "Voice-controlled smart home dashboard")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "homeharmony.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard: voice input on stdin and the HTTP API (default)
    Serve,

    /// Print the dashboard once
    Devices {
        /// Only show devices in this room
        #[arg(long)]
        room: Option<String>,
    },

    /// Flip a device, starting from the value held by the remote store
    Toggle { id: String },

    /// Switch a device on or off
    Set { id: String, power: Power },

    /// Run one voice command, e.g. `say "fan band karo"`
    Say { text: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Power {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, missing) = match Config::from_file(&cli.config) {
        Ok(config) => (config, false),
        Err(ConfigError::Io(_, e)) if e.kind() == std::io::ErrorKind::NotFound => {
            (Config::default(), true)
        }
        Err(e) => return Err(e).context(format!("loading {}", cli.config.display())),
    };

    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(config.logging.targets())
        .init();

    if missing {
        tracing::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    } else {
        tracing::info!("Loaded config from: {}", cli.config.display());
    }

    let catalog = Arc::new(config.catalog()?);
    for (shorter, longer) in catalog.ambiguous_names() {
        if shorter.to_lowercase() == longer.to_lowercase() {
            tracing::warn!(
                "Several devices are named '{}'; commands will switch all of them",
                shorter
            );
            continue;
        }
        tracing::warn!(
            "Device name '{}' is contained in '{}'; commands for '{}' will also switch '{}'",
            shorter,
            longer,
            longer,
            shorter
        );
    }

    let remote = remote::from_config(&config)?;
    let store = Arc::new(DeviceStateStore::new(catalog, remote));
    if config.store.hydrate_on_start {
        store.hydrate().await;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, store).await,
        Commands::Devices { room } => {
            let filter = room.as_deref().map(RoomFilter::from).unwrap_or_default();
            if !store.catalog().has_room(&filter) {
                bail!("unknown room '{}'", filter);
            }
            let dashboard = view::dashboard(
                store.catalog(),
                &store.snapshot(),
                &filter,
                &VoiceStatus::default(),
            );
            println!("{}", dashboard);
            Ok(())
        }
        Commands::Toggle { id } => {
            let on = toggle_persisted(&store, &id).await?;
            println!("{}: {}", id, if on { "ON" } else { "OFF" });
            Ok(())
        }
        Commands::Set { id, power } => {
            let on = matches!(power, Power::On);
            store
                .set_state(&id, on, ChangeSource::Manual)?
                .outcome()
                .await
                .with_context(|| format!("saving state of {}", id))?;
            println!("{}: {}", id, if on { "ON" } else { "OFF" });
            Ok(())
        }
        Commands::Say { text } => {
            let interpreter = CommandInterpreter::new(store);
            let output = SpeechOutput::new(Arc::new(ConsoleSynthesizer), &config.voice);

            let handled = interpreter.handle(&Command::new(&text));
            let feedback = handled.feedback();
            for write in handled.writes {
                let id = write.device_id().to_string();
                if let Err(e) = write.outcome().await {
                    tracing::warn!("Failed to save state of {}: {}", id, e);
                }
            }

            match feedback {
                Some(phrase) => output.speak(&phrase).await,
                None => println!("No device matched \"{}\"", text),
            }
            Ok(())
        }
    }
}

/// Toggle `id` relative to its persisted value and wait for the write.
///
/// Each CLI run starts from a fresh store, so the current value has to come
/// from the remote store.
async fn toggle_persisted(store: &DeviceStateStore, id: &str) -> anyhow::Result<bool> {
    match store.load(id).await {
        Ok(_) => {}
        Err(StoreError::ReadUnsupported(backend)) => bail!(
            "cannot toggle {}: the {} store cannot be read back, use `set {} on|off` instead",
            id,
            backend,
            id
        ),
        Err(e) => return Err(e.into()),
    }

    let write = store.toggle(id, ChangeSource::Manual)?;
    let on = write.value();
    write
        .outcome()
        .await
        .with_context(|| format!("saving state of {}", id))?;
    Ok(on)
}

async fn serve(config: &Config, store: Arc<DeviceStateStore>) -> anyhow::Result<()> {
    tracing::info!("homeharmony starting ({} devices)", store.catalog().len());

    let voice = if config.voice.enabled {
        Some(start_voice(config, store.clone()).await?)
    } else {
        tracing::info!("Voice input is disabled");
        None
    };

    tokio::spawn(render_on_change(store.clone(), voice.clone()));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    if config.api.enabled {
        let state = api::AppState::new(store, voice);
        api::serve(&config.api.listen, config.api.port, state, shutdown_rx).await?;
    } else {
        tracing::info!("Press Ctrl+C to exit");
        shutdown_rx.await.ok();
    }

    tracing::info!("homeharmony shutdown complete");
    Ok(())
}

/// Spawn the voice adapter, reading transcripts from stdin.
async fn start_voice(config: &Config, store: Arc<DeviceStateStore>) -> anyhow::Result<VoiceHandle> {
    let factory: RecognizerFactory = Box::new(|_options: &RecognitionOptions| {
        let stdin = BufReader::new(tokio::io::stdin());
        Ok(Box::new(LineRecognizer::new(stdin)) as Box<dyn SpeechRecognizer>)
    });

    let adapter = VoiceAdapter::new(
        factory,
        RecognitionOptions::from(&config.voice),
        CommandInterpreter::new(store),
        SpeechOutput::new(Arc::new(ConsoleSynthesizer), &config.voice),
    );
    let (handle, _task) = adapter.spawn();

    if config.voice.listen_on_start {
        handle.start().await.context("starting voice input")?;
        tracing::info!("Type a command and press enter, e.g. \"fan band karo\"");
    }

    Ok(handle)
}

/// Print the dashboard every time a device changes.
async fn render_on_change(store: Arc<DeviceStateStore>, voice: Option<VoiceHandle>) {
    let mut events = store.subscribe();
    loop {
        match events.recv().await {
            Ok(Event::DeviceStateChanged { .. }) => {
                let status = voice
                    .as_ref()
                    .map(VoiceHandle::status)
                    .unwrap_or_default();
                let dashboard = view::dashboard(
                    store.catalog(),
                    &store.snapshot(),
                    &RoomFilter::All,
                    &status,
                );
                println!("{}\n", dashboard);
            }
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Dashboard fell behind by {} state changes", n);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
