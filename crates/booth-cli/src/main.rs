use anyhow::{Context, Result};
use booth_core::{composite, transition, Backends, SegMethod, SessionEvent, SessionState};
use booth_store::{PhotoStore, RecordStore, Registration};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "booth", about = "Recruitment-stand photo kiosk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite a photograph onto the configured backdrop
    Composite {
        /// Input photograph
        #[arg(short, long)]
        input: PathBuf,
        /// Output path for the composite
        #[arg(short, long)]
        output: PathBuf,
        /// Backdrop image (defaults to BOOTH_BACKGROUND)
        #[arg(short, long)]
        background: Option<PathBuf>,
        /// Segmentation method: auto, portrait, matting, grabcut
        #[arg(short, long, default_value = "auto")]
        method: SegMethod,
    },
    /// Register a visitor, optionally compositing and storing their photo
    Register {
        /// Visitor name
        #[arg(long)]
        name: String,
        /// Contact email or phone
        #[arg(long, default_value = "not provided")]
        contact: String,
        /// Interest in enrolling
        #[arg(long, default_value = "undecided")]
        interest: String,
        /// Program or study area of interest
        #[arg(long, default_value = "undecided")]
        program: String,
        /// Intended entry term
        #[arg(long, default_value = "undecided")]
        term: String,
        /// Captured photograph to composite and store
        #[arg(long)]
        photo: Option<PathBuf>,
        /// Segmentation method: auto, portrait, matting, grabcut
        #[arg(short, long, default_value = "auto")]
        method: SegMethod,
    },
    /// List stored registrations
    Records,
    /// Report which segmentation backends are usable
    Probe,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command {
        Commands::Composite { input, output, background, method } => {
            let photo = image::open(&input)
                .with_context(|| format!("open photograph: {}", input.display()))?
                .to_rgb8();
            let background = background.unwrap_or(cfg.background_path);

            let mut backends = Backends::probe(&cfg.model_dir);
            let result = composite(&mut backends, &photo, &background, method);

            for warning in &result.warnings {
                println!("warning: {warning}");
            }
            result
                .image
                .save(&output)
                .with_context(|| format!("write composite: {}", output.display()))?;
            println!("wrote {} (method: {})", output.display(), result.method.as_str());
        }

        Commands::Register { name, contact, interest, program, term, photo, method } => {
            let records = RecordStore::new(&cfg.records_path);
            let photo_store = PhotoStore::new(&cfg.photo_dir);

            let mut state = SessionState::Idle;
            let mut stored_photo = None;

            if let Some(photo_path) = photo {
                state = transition(state, SessionEvent::OpenCamera)?;
                let captured = image::open(&photo_path)
                    .with_context(|| format!("open photograph: {}", photo_path.display()))?
                    .to_rgb8();
                state = transition(state, SessionEvent::Capture)?;

                let mut backends = Backends::probe(&cfg.model_dir);
                let result = composite(&mut backends, &captured, &cfg.background_path, method);
                for warning in &result.warnings {
                    println!("warning: {warning}");
                }
                println!("segmentation method: {}", result.method.as_str());

                stored_photo = Some(photo_store.save(&name, &result.image)?);
            }

            state = transition(state, SessionEvent::Submit)?;

            let has_photo = stored_photo.is_some() || photo_store.has_photo(&name)?;
            let total = records.append(Registration::new(
                &name, &interest, &program, &term, &contact, has_photo,
            ))?;
            println!("registration saved ({total} total)");

            if let Some(path) = &stored_photo {
                state = transition(state, SessionEvent::Download)?;
                println!("photo ready for download: {}", path.display());
            }

            state = transition(state, SessionEvent::Reset)?;
            tracing::debug!(?state, "session reset for next visitor");
        }

        Commands::Records => {
            let records = RecordStore::new(&cfg.records_path).load()?;
            for r in &records {
                println!(
                    "{}  {}  interest={}  program={}  term={}  photo={}",
                    r.registered_at, r.name, r.interest, r.program, r.term,
                    if r.has_photo { "yes" } else { "no" },
                );
            }
            println!("{} registration(s)", records.len());
        }

        Commands::Probe => {
            let backends = Backends::probe(&cfg.model_dir);
            for method in backends.available() {
                println!("usable: {}", method.as_str());
            }
            println!(
                "face detector (grabcut seeding): {}",
                if backends.has_face_detector() { "available" } else { "unavailable" },
            );
        }
    }

    Ok(())
}
