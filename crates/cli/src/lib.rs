use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_model::JsonForm;
use pdf_provider::{DocumentSource, LopdfProvider, PdfProvider};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use viewer_core::{MatchRect, ViewerSession};

#[derive(Debug, Parser)]
#[command(name = "fieldview-cli")]
#[command(about = "FieldView document tools")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Locate a field name or value inside a PDF.
    Search {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "QUERY")]
        query: String,
        /// Emit the match list as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Print the extracted text runs for a page.
    ExtractText {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Render a page to a PNG at the current layout scale.
    RenderPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve every field of a form JSON against a PDF and report where
    /// each one landed.
    CheckForm {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "FORM_JSON")]
        form: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    query: String,
    matches: Vec<MatchRect>,
}

#[derive(Debug, Serialize)]
struct FieldReport {
    path: String,
    filled: bool,
    matched_pages: Vec<u32>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    init_tracing();
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Search { file, query, json } => run_search(&file, &query, json),
        Commands::ExtractText { file, page } => run_extract_text(&file, page),
        Commands::RenderPage { file, page, output } => {
            run_render_page(&file, page, output.as_deref())
        }
        Commands::CheckForm { file, form } => run_check_form(&file, &form),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_session(file: &Path) -> Result<ViewerSession<LopdfProvider>> {
    ensure_pdf_exists(file)?;

    let mut session = ViewerSession::new(LopdfProvider::new());
    session
        .open(DocumentSource::from(file))
        .with_context(|| format!("failed to open PDF {}", file.display()))?;
    Ok(session)
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut provider = LopdfProvider::new();
    let handle = provider.open(DocumentSource::from(file)).context("failed to open PDF")?;

    let page_count = provider.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = provider.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    provider.close(handle)?;
    Ok(())
}

fn run_search(file: &Path, query: &str, json: bool) -> Result<()> {
    let mut session = open_session(file)?;
    let result = session.search(query.into());

    if json {
        let payload = SearchOutput {
            query: result.query().to_owned(),
            matches: result.matches().to_vec(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("no matches for {query:?}");
        return Ok(());
    }

    for hit in result.matches() {
        let rect = hit.rect;
        println!(
            "page {} [{}] ({:.1}, {:.1})-({:.1}, {:.1})",
            hit.page,
            hit.kind.as_str(),
            rect.x1,
            rect.y1,
            rect.x2,
            rect.y2
        );
    }
    Ok(())
}

fn run_extract_text(file: &Path, page: u32) -> Result<()> {
    let session = open_session(file)?;

    let index = session.index().context("no geometry index after open")?;
    let geometry = index
        .page(page)
        .with_context(|| format!("page {page} out of range (1..={})", index.page_count()))?;

    for run in &geometry.runs {
        println!("({:.1}, {:.1}) {}", run.x, run.y, run.text);
    }
    Ok(())
}

fn run_render_page(file: &Path, page: u32, output: Option<&Path>) -> Result<()> {
    let session = open_session(file)?;

    let image = session
        .render_page(page)
        .with_context(|| format!("failed to render page {page}"))?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn run_check_form(file: &Path, form_path: &Path) -> Result<()> {
    let form_bytes = fs::read(form_path)
        .with_context(|| format!("failed to read form {}", form_path.display()))?;
    let form: JsonForm = serde_json::from_slice(&form_bytes).context("invalid form JSON")?;

    let mut session = open_session(file)?;

    let mut reports = Vec::new();
    for field in form.fields() {
        let Some(field_ref) = form.field_ref(&field.path) else {
            continue;
        };

        let result = session.search(field_ref);
        reports.push(FieldReport {
            path: field.path.to_string(),
            filled: !field.is_empty(),
            matched_pages: result.matches().iter().map(|hit| hit.page).collect(),
        });
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
