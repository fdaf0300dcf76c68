use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use school_report::api::{ApiClient, SessionListener};
use school_report::assemble::{DocumentViewer, OutputMode};
use school_report::auth::{CredentialStore, FileStorage};
use school_report::capture::PageCapture;
use school_report::config::Settings;
use school_report::fetcher::{FetchState, ReportFetcher};
use school_report::generator::{Notification, NotificationLevel, Notifier, ReportGenerator};
use school_report::model::StudentReportRecord;
use school_report::{ReportError, ReportResult};

const DEFAULT_LOG_DIRECTIVES: &str = "info";

/// Generates student report PDFs from the school portal backend.
///
/// Text is drawn with the fonts found in `SCHOOL_REPORT_FONTS_DIR`, `assets/fonts` next
/// to the binary, or the system fonts, in that order.
#[derive(Parser)]
#[command(author, version, about = "Student report PDF generator")]
struct Cli {
    /// Settings file. Defaults to `SCHOOL_REPORT_CONFIG` or `school-report.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a student's report record and build the PDF.
    Generate {
        #[arg(long)]
        student: String,
        /// Open the PDF in a viewer instead of saving it.
        #[arg(long)]
        preview: bool,
        /// Output directory, overriding the configured one.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build the PDF from a report record stored as JSON, without contacting the backend.
    Render {
        #[arg(long)]
        record: PathBuf,
        #[arg(long)]
        preview: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Exchange an authorization code for a session.
    Login {
        #[arg(long)]
        code: String,
    },

    /// Forget the stored session.
    Logout,

    /// Print the identity provider URL that starts the login flow.
    #[command(name = "authorize-url", aliases = ["authorize_url"])]
    AuthorizeUrl {
        #[arg(long)]
        state: Option<String>,
    },
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => println!("{}", notification.message),
            NotificationLevel::Error => eprintln!("{}", notification.message),
        }
    }
}

struct ConsoleSessionListener;

impl SessionListener for ConsoleSessionListener {
    fn on_session_expired(&self, login_path: &str) {
        eprintln!(
            "Session expired ({login_path}). Run `school-report authorize-url` and log in again."
        );
    }
}

/// Writes the document to the temp directory and opens it with the platform viewer.
struct SystemViewer;

impl DocumentViewer for SystemViewer {
    fn show(&self, file_name: &str, bytes: &[u8]) -> ReportResult<()> {
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, bytes)?;
        open_with_system_viewer(&path)?;
        tracing::info!("Opened preview {}", path.display());
        Ok(())
    }
}

fn open_with_system_viewer(path: &Path) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command.arg(path).spawn().map(|_| ())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
    if let Err(err) = result {
        eprintln!("Logging is unavailable: {err}");
    }
}

fn load_settings(path: Option<&Path>) -> ReportResult<Settings> {
    match path {
        Some(path) => {
            let mut settings = Settings::from_file(path)?;
            settings.apply_overrides(|key| std::env::var(key).ok());
            Ok(settings)
        }
        None => Settings::load(),
    }
}

fn api_client(settings: &Settings) -> ReportResult<ApiClient> {
    let storage = FileStorage::open(&settings.credentials_path)?;
    let credentials = CredentialStore::new(Arc::new(storage));
    Ok(ApiClient::new(settings.api_base_url.as_str(), credentials)?
        .with_session_listener(Arc::new(ConsoleSessionListener)))
}

fn output_mode(settings: &Settings, preview: bool, out: Option<PathBuf>) -> OutputMode {
    if preview {
        OutputMode::Preview
    } else {
        OutputMode::Download {
            directory: out.unwrap_or_else(|| settings.output_dir.clone()),
        }
    }
}

async fn generate(
    settings: &Settings,
    record: &StudentReportRecord,
    mode: OutputMode,
) -> Result<(), Box<dyn Error>> {
    let capture = PageCapture::with_font_directory(settings.fonts_dir.as_deref());
    let generator = ReportGenerator::new(
        Arc::new(capture),
        Arc::new(SystemViewer),
        Arc::new(ConsoleNotifier),
    )
    .with_policy(settings.final_score);

    match generator.generate(record, &mode).await {
        Some(_) => Ok(()),
        None => Err("report generation failed".into()),
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            student,
            preview,
            out,
        } => {
            let mut fetcher = ReportFetcher::new(api_client(&settings)?);
            if let FetchState::Failed { message, .. } = fetcher.load(&student).await {
                return Err(format!("could not load the report for student {student}: {message}").into());
            }
            let record = fetcher
                .take_record()
                .ok_or("the report record was not loaded")?;
            generate(&settings, &record, output_mode(&settings, preview, out)).await
        }
        Commands::Render {
            record,
            preview,
            out,
        } => {
            let contents = std::fs::read_to_string(&record)
                .map_err(|err| format!("cannot read {}: {err}", record.display()))?;
            let record: StudentReportRecord =
                serde_json::from_str(&contents).map_err(ReportError::from)?;
            generate(&settings, &record, output_mode(&settings, preview, out)).await
        }
        Commands::Login { code } => {
            let session = api_client(&settings)?.login(&code).await?;
            println!("Logged in as {} ({:?})", session.user.name, session.user.role);
            Ok(())
        }
        Commands::Logout => {
            api_client(&settings)?.logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::AuthorizeUrl { state } => {
            let url = settings.oauth.authorization_url(state.as_deref())?;
            println!("{url}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
