use clap::{Parser, Subcommand, ValueEnum};
use draft_editor::config::{EditorConfig, config_file_path, load_config};
use draft_editor::editor::{ColorBoxEditor, DocumentHost};
use draft_editor::media::{ImageItem, InMemoryLibrary, MediaItem, VideoItem};
use draft_editor::render::render_document;
use draft_editor::richtext::api_data::document_to_api_data;
use draft_editor::richtext::content_document::ContentDocument;
use draft_editor::richtext::entity::{EntityData, EntityKey};
use draft_editor::richtext::html_converter::{document_to_html, html_to_document};
use draft_editor::richtext::raw::document_to_raw;
use draft_editor::selector::{Selector, SelectorConfig, SelectorState};
use draft_editor::store::{DocumentStore, read_document};
use draft_editor::{DraftError, DraftResult};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "draft-editor")]
#[command(about = "Inspect and convert block/entity rich-text documents", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Documents directory (for ls, check and set-color)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (repeat for more); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a raw JSON or HTML document to HTML
    ToHtml { file: PathBuf },
    /// Convert a document to raw JSON
    ToRaw { file: PathBuf },
    /// Print the API data projection of a document
    ApiData { file: PathBuf },
    /// Print a one-line preview per block
    Render { file: PathBuf },
    /// List all documents
    Ls,
    /// Validate all documents
    Check,
    /// Recolor a color box in a stored document
    SetColor {
        /// Document name, relative to the documents directory
        name: String,
        /// Entity key of the color box
        #[arg(long)]
        key: String,
        #[arg(long)]
        color: String,
        /// Replace the box body with this paragraph
        #[arg(long)]
        text: Option<String>,
    },
    /// Run one selector search against a JSON media library
    Search {
        /// JSON array of media items
        #[arg(long)]
        library: PathBuf,
        #[arg(long, value_enum, default_value_t = Kind::Image)]
        kind: Kind,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Image,
    Video,
    SiteImage,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn get_documents_dir(args: &Args) -> PathBuf {
    args.directory.clone().unwrap_or_else(|| {
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    })
}

fn get_config(args: &Args) -> DraftResult<EditorConfig> {
    match args.config.clone().or_else(config_file_path) {
        Some(path) => load_config(&path),
        None => Ok(EditorConfig::default()),
    }
}

fn cmd_to_html(file: &Path) -> DraftResult<()> {
    let doc = read_document(file)?;
    println!("{}", document_to_html(&doc));
    Ok(())
}

fn cmd_to_raw(file: &Path) -> DraftResult<()> {
    let doc = read_document(file)?;
    let raw = document_to_raw(&doc)?;
    println!("{}", serde_json::to_string_pretty(&raw)?);
    Ok(())
}

fn cmd_api_data(file: &Path) -> DraftResult<()> {
    let doc = read_document(file)?;
    println!("{}", serde_json::to_string_pretty(&document_to_api_data(&doc))?);
    Ok(())
}

fn cmd_render(file: &Path) -> DraftResult<()> {
    let doc = read_document(file)?;
    for line in render_document(&doc) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_ls(documents_dir: &Path) -> DraftResult<()> {
    let store = DocumentStore::new(documents_dir.to_path_buf());
    for doc in store.list_all_documents()? {
        println!("{}", doc);
    }
    Ok(())
}

fn cmd_check(documents_dir: &Path) -> DraftResult<bool> {
    let store = DocumentStore::new(documents_dir.to_path_buf());
    let failures = store.check_all()?;

    for failure in &failures {
        println!("{}: {}", failure.name, failure.error);
    }
    Ok(failures.is_empty())
}

fn cmd_set_color(
    config: &EditorConfig,
    documents_dir: &Path,
    name: &str,
    key: &str,
    color: &str,
    text: Option<&str>,
) -> DraftResult<()> {
    let store = DocumentStore::new(documents_dir.to_path_buf());
    let mut stored = store.load(name)?;
    let key = EntityKey::from(key);

    let existing = match stored.document.entities().get(&key).ok().map(|e| &e.data) {
        Some(EntityData::ColorBox(data)) => data.clone(),
        Some(other) => {
            return Err(DraftError::EntityTypeMismatch {
                key,
                expected: other.type_tag().to_string(),
                found: "color-box".to_string(),
            });
        }
        None => return Err(DraftError::EntityNotFound(key)),
    };

    let mut host = DocumentHost::from_config(stored.document, config);
    let mut editor = ColorBoxEditor::for_entity(key, &existing);
    let body = match text {
        Some(text) => document_to_raw(&ContentDocument::with_paragraph(text))?,
        None => match &existing.raw_content_state {
            Some(raw) => raw.clone(),
            None => document_to_raw(&html_to_document(&existing.body))?,
        },
    };
    editor.open(&mut host);
    editor.commit(&mut host, color, body)?;

    stored.document = host.into_document();
    let path = store.save(&stored)?;
    println!("{}", path.display());
    Ok(())
}

fn read_library<T: DeserializeOwned + MediaItem>(path: &Path) -> DraftResult<InMemoryLibrary<T>> {
    let content = fs::read_to_string(path).map_err(|err| DraftError::io(path, err))?;
    let items: Vec<T> = serde_json::from_str(&content)?;
    Ok(InMemoryLibrary::new(items))
}

fn search<T: MediaItem>(
    library: &InMemoryLibrary<T>,
    config: SelectorConfig,
    query: &str,
    page: usize,
) -> DraftResult<()> {
    let now = Instant::now();
    let mut selector = Selector::new(config);
    selector.set_search_text(query, now);
    selector.set_page(page, now);
    selector.run_due(now, library);

    match selector.state() {
        SelectorState::Error(diagnostic) => {
            return Err(DraftError::Search(format!(
                "{} (search {:?}, skip {}, take {})",
                diagnostic.message, diagnostic.query.search_text, diagnostic.query.skip, diagnostic.query.take
            )));
        }
        _ => {
            println!(
                "page {}/{} ({} matches)",
                selector.page(),
                selector.total_pages().max(1),
                selector.count()
            );
            for item in selector.results() {
                println!("  {}  {}", item.id(), item.name().unwrap_or("(unnamed)"));
            }
        }
    }
    Ok(())
}

fn cmd_search(config: &EditorConfig, library: &Path, kind: Kind, query: &str, page: usize) -> DraftResult<()> {
    let settings = &config.selector;
    match kind {
        Kind::Image => search(
            &read_library::<ImageItem>(library)?,
            SelectorConfig::image().from_settings(settings, settings.image_page_size),
            query,
            page,
        ),
        Kind::SiteImage => search(
            &read_library::<ImageItem>(library)?,
            SelectorConfig::site_image().from_settings(settings, settings.site_image_page_size),
            query,
            page,
        ),
        Kind::Video => search(
            &read_library::<VideoItem>(library)?,
            SelectorConfig::video().from_settings(settings, settings.video_page_size),
            query,
            page,
        ),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = get_config(&args).and_then(|config| match &args.command {
        Commands::ToHtml { file } => cmd_to_html(file),
        Commands::ToRaw { file } => cmd_to_raw(file),
        Commands::ApiData { file } => cmd_api_data(file),
        Commands::Render { file } => cmd_render(file),
        Commands::Ls => cmd_ls(&get_documents_dir(&args)),
        Commands::Check => cmd_check(&get_documents_dir(&args)).map(|clean| {
            if !clean {
                std::process::exit(2);
            }
        }),
        Commands::SetColor { name, key, color, text } => {
            cmd_set_color(&config, &get_documents_dir(&args), name, key, color, text.as_deref())
        }
        Commands::Search {
            library,
            kind,
            query,
            page,
        } => cmd_search(&config, library, *kind, query, *page),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
