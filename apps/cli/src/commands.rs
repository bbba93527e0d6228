//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use leadenrich_core::{
    ChatCompletionsClient, DEFAULT_PROMPT_TEMPLATE, EmailOptions, Pipeline, PipelineOptions,
    ProgressReporter, RunPlan, RunReport, SearchRequest, StageReport, TableSource,
};
use leadenrich_places::PlacesClient;
use leadenrich_shared::{
    AppConfig, GenerationConfig, GeoBias, PlacesConfig, WebsiteConfig, init_config, load_config,
    read_api_key,
};
use leadenrich_table::Completeness;
use leadenrich_website::SiteFetcher;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadEnrich: fill business lead files with reviews, website data and emails.
#[derive(Parser)]
#[command(
    name = "leadenrich",
    version,
    about = "Search for businesses and enrich lead files without re-fetching what they already have.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fill rating, review count and map URL into an existing lead file.
    Enrich {
        /// Input CSV file.
        input: PathBuf,

        /// Output CSV file.
        output: PathBuf,

        /// Also profile each business website.
        #[arg(long)]
        web: bool,

        /// Also generate outreach emails.
        #[arg(long)]
        emails: bool,

        #[command(flatten)]
        email: EmailArgs,
    },

    /// Search the places index and save the results.
    Search {
        /// Search query (e.g. "dentists in Austin TX").
        query: String,

        /// Output CSV file.
        output: PathBuf,

        /// Maximum number of results.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Merge into the existing output file, skipping known businesses.
        #[arg(long)]
        append: bool,

        /// Bias results around "lat,lng".
        #[arg(long)]
        location: Option<String>,

        /// Bias radius in miles.
        #[arg(long, default_value_t = 10.0)]
        radius: f64,

        /// Also profile each business website.
        #[arg(long)]
        enrich_web: bool,

        /// Also generate outreach emails.
        #[arg(long)]
        emails: bool,

        #[command(flatten)]
        email: EmailArgs,
    },

    /// Add social links and a research brief from each business website.
    EnrichWeb {
        /// Input CSV file with a Website column.
        input: PathBuf,

        /// Output CSV file.
        output: PathBuf,
    },

    /// Draft a personalized outreach email for each lead.
    GenerateEmails {
        /// Input CSV file, ideally already enriched.
        input: PathBuf,

        /// Output CSV file.
        output: PathBuf,

        #[command(flatten)]
        email: EmailArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of the email stage.
#[derive(Args, Debug, Default)]
pub(crate) struct EmailArgs {
    /// Model identifier (defaults to the configured model).
    #[arg(long)]
    pub model: Option<String>,

    /// Description of the product or service being offered.
    #[arg(long)]
    pub product: Option<String>,

    /// Text-generation API key (defaults to the configured environment variable).
    #[arg(long)]
    pub api_key: Option<String>,

    /// Prompt template file using {placeholder} keys.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadenrich=info",
        1 => "leadenrich=debug",
        _ => "leadenrich=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich {
            input,
            output,
            web,
            emails,
            email,
        } => {
            let config = load_config()?;
            let plan = RunPlan {
                source: TableSource::File(existing_input(&input)?),
                output,
                reviews: true,
                website: web,
                emails: emails.then(|| email_options(&email)).transpose()?,
            };
            execute(&config, &plan, &email).await
        }
        Command::Search {
            query,
            output,
            limit,
            append,
            location,
            radius,
            enrich_web,
            emails,
            email,
        } => {
            let config = load_config()?;
            let bias = location
                .as_deref()
                .map(|loc| GeoBias::parse(loc, radius))
                .transpose()?;
            let plan = RunPlan {
                source: TableSource::Search(SearchRequest {
                    query,
                    limit,
                    bias,
                    append,
                }),
                output,
                reviews: false,
                website: enrich_web,
                emails: emails.then(|| email_options(&email)).transpose()?,
            };
            execute(&config, &plan, &email).await
        }
        Command::EnrichWeb { input, output } => {
            let config = load_config()?;
            let plan = RunPlan {
                source: TableSource::File(existing_input(&input)?),
                output,
                reviews: false,
                website: true,
                emails: None,
            };
            execute(&config, &plan, &EmailArgs::default()).await
        }
        Command::GenerateEmails {
            input,
            output,
            email,
        } => {
            let config = load_config()?;
            let plan = RunPlan {
                source: TableSource::File(existing_input(&input)?),
                output,
                reviews: false,
                website: false,
                emails: Some(email_options(&email)?),
            };
            execute(&config, &plan, &email).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Run execution
// ---------------------------------------------------------------------------

/// Collaborators a plan needs, built from config and the environment.
struct Collaborators {
    places: Option<PlacesClient>,
    pages: Option<SiteFetcher>,
    generator: Option<ChatCompletionsClient>,
}

impl Collaborators {
    fn for_plan(config: &AppConfig, plan: &RunPlan, email: &EmailArgs) -> Result<Self> {
        let needs_places = plan.reviews || matches!(plan.source, TableSource::Search(_));

        let places = if needs_places {
            let key = read_api_key(&config.places.api_key_env, "Google Maps")?;
            Some(PlacesClient::new(PlacesConfig::from_section(&config.places, key))?)
        } else {
            None
        };

        let pages = if plan.website {
            Some(SiteFetcher::new(&WebsiteConfig::from(config))?)
        } else {
            None
        };

        let generator = if plan.emails.is_some() {
            let key = match &email.api_key {
                Some(key) => key.clone(),
                None => read_api_key(&config.generation.api_key_env, "Text generation")?,
            };
            let generation =
                GenerationConfig::from_section(&config.generation, email.model.as_deref(), key);
            info!(model = %generation.model, "email generation enabled");
            Some(ChatCompletionsClient::new(generation)?)
        } else {
            None
        };

        Ok(Self {
            places,
            pages,
            generator,
        })
    }

    fn pipeline(&self, options: PipelineOptions) -> Pipeline<'_> {
        let mut pipeline = Pipeline::new(options);
        if let Some(places) = &self.places {
            pipeline = pipeline.with_places(places);
        }
        if let Some(pages) = &self.pages {
            pipeline = pipeline.with_pages(pages);
        }
        if let Some(generator) = &self.generator {
            pipeline = pipeline.with_generator(generator);
        }
        pipeline
    }
}

fn pipeline_options(config: &AppConfig) -> PipelineOptions {
    PipelineOptions {
        completeness: Completeness::new(config.enrichment.placeholders.iter().cloned()),
        review_delay: Duration::from_millis(config.places.request_delay_ms),
        website_delay: Duration::from_millis(config.website.delay_ms),
        generation_delay: Duration::from_millis(config.generation.delay_ms),
    }
}

async fn execute(config: &AppConfig, plan: &RunPlan, email: &EmailArgs) -> Result<()> {
    let collaborators = Collaborators::for_plan(config, plan, email)?;
    let pipeline = collaborators.pipeline(pipeline_options(config));

    let reporter = CliProgress::new();
    let result = pipeline.run(plan, &reporter).await;
    reporter.finish();

    print_summary(&result?);
    Ok(())
}

fn existing_input(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(eyre!("input file not found: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn email_options(email: &EmailArgs) -> Result<EmailOptions> {
    let product_description = email
        .product
        .clone()
        .ok_or_else(|| eyre!("--product is required to generate emails"))?;

    let template = match &email.prompt_file {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read prompt file {}", path.display()))?,
        None => DEFAULT_PROMPT_TEMPLATE.to_string(),
    };

    Ok(EmailOptions {
        template,
        product_description,
    })
}

// ---------------------------------------------------------------------------
// Summary output
// ---------------------------------------------------------------------------

fn print_summary(report: &RunReport) {
    println!();

    if let Some(found) = report.found {
        println!("  Found:     {found} businesses");
    }

    let Some(output) = &report.output else {
        println!("  No businesses found; nothing was saved.");
        println!();
        return;
    };

    if let Some(merge) = &report.merge {
        println!("  Existing:  {}", merge.existing);
        println!("  Appended:  {}", merge.appended);
        println!("  Duplicates skipped: {}", merge.dropped);
        println!("  Dedupe by: {}", merge.strategy);
    }

    for stage in &report.stages {
        print_stage(stage);
    }

    println!("  Rows:      {}", report.rows);
    println!("  Saved to:  {}", output.display());
    if let Some(log) = &report.error_log {
        println!("  Errors:    {} (details in {})", report.errors, log.display());
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn print_stage(stage: &StageReport) {
    println!("  [{}]", stage.stage);
    println!("    Total:            {}", stage.total);
    println!("    Already complete: {}", stage.complete);
    if stage.url_only > 0 {
        println!("    URL only fetched: {}", stage.url_only);
    }
    println!("    Fetched:          {}", stage.fetched);
    if stage.filled > 0 {
        println!("    Filled locally:   {}", stage.filled);
    }
    println!("    Succeeded:        {}", stage.succeeded());
    println!("    Failed:           {}", stage.failed);
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar per stage.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {pos}/{len}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_position(0);
        self.bar.set_length(0);
        self.bar.set_message(name.to_string());
    }

    fn row_done(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }

    fn stage_done(&self, report: &StageReport) {
        self.bar.println(format!(
            "  {} done: {} fetched, {} complete, {} failed",
            report.stage, report.fetched, report.complete, report.failed
        ));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
