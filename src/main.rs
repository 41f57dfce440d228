use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use facility_docs::app::ports::{HttpClientPort, ObjectStorePort};
use facility_docs::infra::{ReqwestHttp, SupabaseStorage};
use facility_docs::pipeline::request::normalize_url;
use facility_docs::pipeline::TitleExtractor;
use facility_docs::storage::InMemoryObjectStore;
use facility_docs::{logging, observability, Config, DocumentPipeline, DocumentRequest, DocumentType, Notice};

#[derive(Parser)]
#[command(name = "facility_docs")]
#[command(about = "Fetch, validate and store external documents for recycling facilities")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "facility_docs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a document and print the resulting library record
    Submit {
        #[arg(long)]
        url: String,
        /// Title to store under; looked up from the page when omitted
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        /// report, study, article, press release, analysis or research
        #[arg(long = "type", default_value = "article")]
        doc_type: String,
        #[arg(long)]
        description: Option<String>,
        /// Facility the document belongs to
        #[arg(long)]
        entity: Option<String>,
        /// Store into an in-memory bucket instead of Supabase
        #[arg(long)]
        dry_run: bool,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
    /// Show how a URL is classified
    Classify {
        #[arg(long)]
        url: String,
    },
    /// Suggest a title for a URL
    Title {
        #[arg(long)]
        url: String,
    },
    /// List the fetch strategies that would run for a URL, in order
    Strategies {
        #[arg(long)]
        url: String,
    },
}

fn build_store(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn ObjectStorePort>> {
    if dry_run {
        info!("Dry run: using in-memory storage");
        return Ok(Arc::new(InMemoryObjectStore::new()));
    }
    let store = SupabaseStorage::from_config(&config.storage)
        .context("Supabase storage is not configured; set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY or pass --dry-run")?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_env_overrides();
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(
        config.fetch.attempt_timeout(),
        config.storage.bucket_size_limit_bytes,
    )?);

    match cli.command {
        Commands::Submit {
            url,
            title,
            author,
            doc_type,
            description,
            entity,
            dry_run,
            metrics,
        } => {
            if metrics {
                observability::init().map_err(|e| anyhow!("{}", e))?;
            }
            let doc_type = DocumentType::parse(&doc_type)
                .ok_or_else(|| anyhow!("unknown document type '{}'", doc_type))?;

            let title = match title {
                Some(title) => title,
                None => {
                    let extractor = TitleExtractor::new(
                        http.clone(),
                        config.fetch.title_relay_template.clone(),
                        config.fetch.attempt_timeout(),
                    );
                    match extractor.suggest(&normalize_url(&url)?).await {
                        Some(found) => {
                            info!(title = %found, "Using page title");
                            found
                        }
                        None => {
                            warn!("No page title found, pass --title");
                            return Err(anyhow!("a title is required for {}", url));
                        }
                    }
                }
            };

            let mut request = DocumentRequest::new(title, url).with_type(doc_type);
            if let Some(author) = author {
                request = request.with_author(author);
            }
            if let Some(description) = description {
                request = request.with_description(description);
            }
            if let Some(entity) = entity {
                request = request.with_entity(entity);
            }

            let store = build_store(&config, dry_run)?;
            let pipeline = DocumentPipeline::new(&config, http, store);
            let submission = pipeline.submit_document(request).await?;

            match &submission.notice {
                Notice::Success => eprintln!("✅ Document stored"),
                Notice::Warning(message) => eprintln!("⚠️  {}", message),
            }
            println!("{}", serde_json::to_string_pretty(&submission)?);

            if metrics {
                if let Some(rendered) = observability::render() {
                    eprintln!("{}", rendered);
                }
            }
        }
        Commands::Classify { url } => {
            let url = normalize_url(&url)?;
            let pipeline = DocumentPipeline::new(&config, http, Arc::new(InMemoryObjectStore::new()));
            println!("{}", serde_json::to_string_pretty(&pipeline.classify(&url))?);
        }
        Commands::Title { url } => {
            let url = normalize_url(&url)?;
            let extractor = TitleExtractor::new(
                http,
                config.fetch.title_relay_template.clone(),
                config.fetch.attempt_timeout(),
            );
            match extractor.suggest(&url).await {
                Some(title) => println!("{}", title),
                None => eprintln!("No title found for {}", url),
            }
        }
        Commands::Strategies { url } => {
            let url = normalize_url(&url)?;
            let pipeline = DocumentPipeline::new(&config, http, Arc::new(InMemoryObjectStore::new()));
            let classification = pipeline.classify(&url);
            for (i, strategy) in pipeline.strategies().plan(&classification).iter().enumerate() {
                println!("{:>2}. {:<20} {}", i + 1, strategy.id, strategy.kind.label());
            }
        }
    }

    Ok(())
}
