use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use studio_cli::report::{is_usable, parse_image, pick_variant, summarize};
use studio_cli::{CliConfig, FileExporter, HttpGenerationClient, OfflineGenerationClient};
use studio_core::{
    ExportRequest, ExportTarget, ExternalContext, GenerationClient, QualityTier, RequestDescription,
    StudioOrchestrator, DEFAULT_DOMAIN,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("Path to studio.toml");

    Command::new("studio")
        .version(studio_cli::VERSION)
        .about("Generate, compare and refine UI candidates")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging (RUST_LOG overrides)"),
        )
        .subcommand(
            Command::new("generate")
                .about("Start a session, settle the batch and optionally refine")
                .arg(
                    Arg::new("goal")
                        .long("goal")
                        .short('g')
                        .default_value("")
                        .help("What to build"),
                )
                .arg(
                    Arg::new("tier")
                        .long("tier")
                        .default_value("fast")
                        .value_parser(value_parser!(QualityTier))
                        .help("fast or high-quality"),
                )
                .arg(
                    Arg::new("domain")
                        .long("domain")
                        .short('d')
                        .default_value(DEFAULT_DOMAIN)
                        .help("Configured domain to use"),
                )
                .arg(
                    Arg::new("image")
                        .long("image")
                        .action(ArgAction::Append)
                        .help("Reference image as <style|asset>:<path-or-url>"),
                )
                .arg(Arg::new("url").long("url").help("Page to use as source material"))
                .arg(Arg::new("search").long("search").help("Search query for source material"))
                .arg(Arg::new("brand").long("brand").help("Brand domain to resolve"))
                .arg(config_arg.clone())
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Use placeholder generation instead of the backend"),
                )
                .arg(
                    Arg::new("refine")
                        .long("refine")
                        .short('r')
                        .action(ArgAction::Append)
                        .help("Feedback for one refinement step; repeatable"),
                )
                .arg(
                    Arg::new("select")
                        .long("select")
                        .value_parser(value_parser!(usize))
                        .help("1-based slot to carry forward (default: first success)"),
                )
                .arg(
                    Arg::new("export")
                        .long("export")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory to write the chosen artifact to"),
                ),
        )
        .subcommand(
            Command::new("domains")
                .about("List configured domains")
                .arg(config_arg),
        )
        .subcommand(Command::new("config").about("Print a starter configuration"))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_request(args: &ArgMatches) -> Result<RequestDescription> {
    let goal = args.get_one::<String>("goal").cloned().unwrap_or_default();
    let tier = args.get_one::<QualityTier>("tier").copied().unwrap_or_default();
    let mut request = RequestDescription::new(goal).with_tier(tier);

    for raw in args.get_many::<String>("image").into_iter().flatten() {
        request = request.with_attachment(parse_image(raw)?);
    }

    let mut context = ExternalContext::new();
    if let Some(url) = args.get_one::<String>("url") {
        context = context.with_fetch_url(url);
    }
    if let Some(query) = args.get_one::<String>("search") {
        context = context.with_search_query(query);
    }
    if let Some(brand) = args.get_one::<String>("brand") {
        context = context.with_brand_domain(brand);
    }
    Ok(request.with_context(context))
}

async fn settle_and_print(studio: &mut StudioOrchestrator) -> Result<bool> {
    let phase = studio.settle_active().await;
    let session = studio.session().context("session disappeared")?;
    print!("{}", summarize(session.batch(), &studio.status()));
    Ok(is_usable(phase))
}

async fn run_generate(args: &ArgMatches) -> Result<()> {
    let config = CliConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let domain = args
        .get_one::<String>("domain")
        .map_or(DEFAULT_DOMAIN, String::as_str);

    let client: Arc<dyn GenerationClient> = if args.get_flag("offline") {
        tracing::info!("Using offline placeholder generation");
        Arc::new(OfflineGenerationClient::new())
    } else {
        let client = HttpGenerationClient::from_config(&config.backend)?;
        tracing::info!(endpoint = %client.endpoint(), "Using HTTP generation backend");
        Arc::new(client)
    };
    let export_dir = args.get_one::<PathBuf>("export").cloned();
    let exporter = Arc::new(FileExporter::new(export_dir.clone().unwrap_or_else(|| PathBuf::from("."))));

    let mut studio = StudioOrchestrator::new(&config.studio, domain, client, exporter.clone())
        .context("failed to set up studio")?;
    let request = build_request(args)?;
    studio.start(request).context("could not start session")?;

    if !settle_and_print(&mut studio).await? {
        bail!("no usable variant; run again to retry");
    }

    let requested = args.get_one::<usize>("select").copied();
    for feedback in args.get_many::<String>("refine").into_iter().flatten() {
        let session = studio.session().context("session disappeared")?;
        let chosen = pick_variant(session.batch(), requested)?;
        studio.select(chosen)?;
        println!("\nrefining variant {} with: {feedback}", chosen.slot + 1);
        studio.refine(feedback)?;
        if !settle_and_print(&mut studio).await? {
            bail!("refinement produced no usable variant");
        }
    }

    if export_dir.is_some() {
        let session = studio.session().context("session disappeared")?;
        let chosen = pick_variant(session.batch(), requested)?;
        let artifact = session
            .batch()
            .get(chosen)
            .and_then(studio_core::Variant::artifact)
            .cloned()
            .context("chosen variant has no artifact")?;
        studio.select(chosen)?;
        let handle = studio
            .export_artifact(Some(chosen), ExportTarget::Download)
            .context("chosen variant cannot be exported")?;
        handle.await.context("export task failed")?;

        let request = ExportRequest {
            target: ExportTarget::Download,
            variant: chosen,
            artifact,
        };
        match exporter.written(&request) {
            Some(path) => println!("\nexported variant {} to {}", chosen.slot + 1, path.display()),
            None => bail!("export of variant {} did not write a file; see log", chosen.slot + 1),
        }
    }
    Ok(())
}

fn run_domains(args: &ArgMatches) -> Result<()> {
    let config = CliConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let domains = if config.studio.domains.is_empty() {
        vec![config.studio.default_domain()]
    } else {
        config.studio.domains.clone()
    };
    for domain in domains {
        println!(
            "{:<12} fast={:<20} high-quality={:<20} tokens={}",
            domain.name,
            domain.models.fast,
            domain.models.high_quality,
            domain.theme_tokens.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("generate", args)) => run_generate(args).await,
        Some(("domains", args)) => run_domains(args),
        Some(("config", _)) => {
            print!("{}", CliConfig::starter().to_toml_string()?);
            Ok(())
        }
        _ => Ok(()),
    }
}
