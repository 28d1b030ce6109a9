use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scraper::{Html, Selector};
use tracing_subscriber::EnvFilter;

use greentext_export::compose::{image_data_uri, random_post_number, PostDraft, SAMPLE_GREENTEXT};
use greentext_export::delivery::overlay::ElementSpec;
use greentext_export::{
    new_capture_engine, DirectoryDownloads, Environment, ExportConfig, ExportController, ExportOutcome,
    ExportRequest, MemoryDocument, ThemeRegistry,
};

#[derive(Parser)]
#[command(name = "greentext-export", version, about = "Render greentext posts to PNG")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a post and export it
    Export(ExportArgs),
    /// List the built-in themes
    Themes,
}

#[derive(Args)]
struct ExportArgs {
    /// Post body (lines starting with '>' are greentext)
    #[arg(long, conflicts_with = "text_file")]
    body: Option<String>,
    /// Read the post body from a file
    #[arg(long = "text", value_name = "FILE")]
    text_file: Option<PathBuf>,
    #[arg(long, default_value = "Anonymous")]
    name: String,
    /// Post number (random 9 digits when omitted)
    #[arg(long)]
    number: Option<String>,
    /// Timestamp shown in the header (now when omitted)
    #[arg(long)]
    date: Option<String>,
    /// Image to attach (PNG, JPEG, GIF, WebP, ...)
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long, default_value = "classic")]
    theme: String,
    /// Download directory (overrides the config)
    #[arg(long)]
    out: Option<PathBuf>,
    /// Emulated user agent
    #[arg(long)]
    user_agent: Option<String>,
    /// Emulated navigator.platform
    #[arg(long)]
    platform: Option<String>,
    #[arg(long, default_value_t = 0)]
    touch_points: u32,
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f32,
}

fn list_themes(config: &ExportConfig) {
    let themes = ThemeRegistry::with_fallback(config.fallback_background);
    for t in themes.list_themes() {
        println!("{:<10} {:<12} background {}", t.id, t.name, t.post_background);
    }
}

async fn export(mut config: ExportConfig, args: ExportArgs) -> Result<()> {
    let themes = ThemeRegistry::with_fallback(config.fallback_background);
    let markup_theme = match themes.get(&args.theme) {
        Some(t) => t,
        None => {
            log::warn!("unknown theme '{}', composing with the default palette", args.theme);
            &themes.list_themes()[0]
        }
    };

    let body = match (&args.body, &args.text_file) {
        (Some(b), _) => b.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        (None, None) => SAMPLE_GREENTEXT.to_string(),
    };
    let image = match &args.image {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let format = image::guess_format(&bytes)
                .with_context(|| format!("{} is not a recognized image", path.display()))?;
            Some(image_data_uri(&bytes, format.to_mime_type()))
        }
        None => None,
    };
    let draft = PostDraft {
        name: args.name.clone(),
        post_number: args.number.clone().unwrap_or_else(|| random_post_number(&mut rand::thread_rng())),
        date_time: args
            .date
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%m/%d/%y(%a)%H:%M:%S").to_string()),
        body,
        image,
    };

    let html = Html::parse_fragment(&draft.render_markup(markup_theme));
    let selector = Selector::parse(".post").map_err(|e| anyhow!("invalid selector: {:?}", e))?;
    let node = html.select(&selector).next().context("composed markup has no post element")?;

    if let Some(out) = args.out {
        config.download_dir = out;
    }
    let doc = Rc::new(MemoryDocument::new());
    let controller = ExportController::new(
        &config,
        new_capture_engine(&config)?,
        DirectoryDownloads::new(config.download_dir.clone()),
        doc.clone(),
    );

    let desktop = Environment::desktop();
    let env = Environment::new(
        args.user_agent.unwrap_or(desktop.user_agent),
        args.platform.unwrap_or(desktop.platform),
        args.touch_points,
    );
    let request = ExportRequest { node, theme_id: &args.theme, text: &draft.body, pixel_ratio: args.pixel_ratio };

    match controller.export_post(request, &env).await {
        ExportOutcome::Downloaded { filename } => {
            println!("{}", config.download_dir.join(filename).display());
        }
        ExportOutcome::Previewed { filename, object_url } => {
            println!("preview overlay showing {} as {}", filename, object_url.as_str());
            for (_, el) in doc.elements() {
                if let ElementSpec::Caption { text } = el {
                    println!("{}", text);
                }
            }
            controller.unmount();
        }
        ExportOutcome::Ignored => bail!("an export is already running"),
        ExportOutcome::Failed(err) => return Err(err.into()),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ExportConfig::from_path(path)?,
        None => ExportConfig::default(),
    };

    match cli.command {
        Command::Themes => {
            list_themes(&config);
            Ok(())
        }
        Command::Export(args) => export(config, args).await,
    }
}
