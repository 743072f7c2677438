use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyeglow_core::{
    AppConfig, Feedback, ImageHandle, KeyValueStore, SceneEvent, Session, SlotRegistry,
    StoreBackend, StoreKind,
};
use tracing_subscriber::EnvFilter;

mod script;

use script::{parse_script, Step};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyeglow_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    if let Some(data_dir) = cli.data_dir {
        config.store.backend = StoreKind::File;
        config.store.data_dir = Some(data_dir);
    }

    let store = StoreBackend::from_config(&config.store);
    let slots = SlotRegistry::with_slot_count(store, config.editor.slot_count);

    match cli.command {
        Commands::Slots => list_slots(&slots).await,
        Commands::Show { slot } => show_slot(&slots, slot).await,
        Commands::Export { output } => export(&slots, output.as_deref()).await,
        Commands::Import { input } => import(&slots, &input).await,
        Commands::Replay { script } => {
            let session = Session::new(slots, &config.editor);
            replay(session, &script).await
        }
    }
}

async fn list_slots<S: KeyValueStore>(slots: &SlotRegistry<S>) -> eyeglow_core::Result<()> {
    let registry = slots.registry().await?;
    for number in 1..=slots.slot_count() {
        let slot = slots.slot(number)?;
        match registry.get(slot) {
            Some(profile) => println!(
                "[{slot}] {} point(s){} saved {}",
                profile.points.len(),
                if profile.locked { ", locked" } else { "" },
                profile.saved_at.to_rfc3339()
            ),
            None => println!("[{slot}] empty"),
        }
    }
    Ok(())
}

async fn show_slot<S: KeyValueStore>(
    slots: &SlotRegistry<S>,
    slot: u8,
) -> eyeglow_core::Result<()> {
    match slots.profile(slot).await? {
        Some(profile) => {
            println!("{}", render_profile(&profile)?);
            Ok(())
        }
        None => Err(eyeglow_core::SlotError::EmptySlot(slots.slot(slot)?).into()),
    }
}

fn render_profile(profile: &eyeglow_core::SceneProfile) -> eyeglow_core::Result<String> {
    let registry: eyeglow_core::ProfileRegistry = std::iter::once(profile.clone()).collect();
    Ok(eyeglow_core::ProfileCodec::export_all(&registry)?)
}

async fn export<S: KeyValueStore>(
    slots: &SlotRegistry<S>,
    output: Option<&Path>,
) -> eyeglow_core::Result<()> {
    let document = slots.export_document().await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, document.as_bytes()).await?;
            tracing::info!(path = %path.display(), "exported profiles");
        }
        None => println!("{document}"),
    }
    Ok(())
}

async fn import<S: KeyValueStore>(
    slots: &SlotRegistry<S>,
    input: &Path,
) -> eyeglow_core::Result<()> {
    let document = tokio::fs::read_to_string(input).await?;
    let registry = slots.import_document(&document).await?;
    println!("imported {} profile(s)", registry.len());
    Ok(())
}

async fn replay<S: KeyValueStore>(
    mut session: Session<S>,
    script: &Path,
) -> eyeglow_core::Result<()> {
    tracing::info!(script = %script.display(), "replaying event script");
    let source = tokio::fs::read_to_string(script).await?;
    let base_dir = script.parent().unwrap_or_else(|| Path::new("."));

    for line in parse_script(&source)? {
        let event = match line.step {
            Step::Event(event) => event,
            Step::UploadFile(path) => {
                let bytes = tokio::fs::read(base_dir.join(path)).await?;
                SceneEvent::UploadImage(ImageHandle::new(bytes))
            }
            Step::ImportFile(path) => {
                let document = tokio::fs::read_to_string(base_dir.join(path)).await?;
                SceneEvent::ImportProfiles(document)
            }
            Step::DeleteSelected => match session.active_drag() {
                Some(index) => SceneEvent::DeletePoint(index),
                None => {
                    let feedback = Feedback::Failure("no point selected".to_string());
                    println!("{:>4}: {feedback}", line.number);
                    continue;
                }
            },
            Step::DeleteAt { x, y } => match session.point_at(x, y) {
                Some(index) => SceneEvent::DeletePoint(index),
                None => {
                    let feedback = Feedback::Failure("no point under pointer".to_string());
                    println!("{:>4}: {feedback}", line.number);
                    continue;
                }
            },
        };

        let feedback = session.handle(event).await;
        println!("{:>4}: {feedback}", line.number);
        if let Feedback::Exported(document) = &feedback {
            println!("{document}");
        }
    }

    let scene = session.scene();
    let points: Vec<String> = scene
        .points
        .iter()
        .map(|point| format!("({:.3}, {:.3})", point.x, point.y))
        .collect();
    println!(
        "scene: image={} points=[{}] locked={} slot={}",
        scene.image.is_some(),
        points.join(", "),
        scene.locked,
        scene
            .active_slot
            .map(|slot| slot.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    let occupied: Vec<String> = session
        .occupied_slots()
        .await?
        .into_iter()
        .map(|slot| slot.to_string())
        .collect();
    println!("occupied slots: [{}]", occupied.join(", "));
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Portrait point annotator with saved scene slots", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Store scenes under this directory instead of the configured one.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every slot and whether it holds a saved scene.
    Slots,
    /// Print the saved profile of one slot.
    Show {
        slot: u8,
    },
    /// Write all saved profiles as a portable JSON document.
    Export {
        /// Destination file; standard output when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace all saved profiles with those in a document.
    Import {
        input: PathBuf,
    },
    /// Run a script of editing events against the store.
    Replay {
        script: PathBuf,
    },
}
