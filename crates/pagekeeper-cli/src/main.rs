use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use pagekeeper::api::ApiClient;
use pagekeeper::auth;
use pagekeeper::config::{self, CliOverrides, FileConfig, Settings};
use pagekeeper::engine::{self, Reporter};
use pagekeeper::error::{ConfigError, ValueKind, is_config_error};
use pagekeeper::git;
use pagekeeper::github::GithubRegistry;
use pagekeeper::pages::PagesRegistry;
use pagekeeper::publisher::WranglerPublisher;
use pagekeeper::types::{CleanReceipt, CleanRequest, DeployReceipt, DeployRequest, PruneReport};

#[derive(Parser, Debug)]
#[command(name = "pagekeeper", version)]
#[command(about = "Publish static sites to Cloudflare Pages and keep GitHub deployments in sync")]
struct Cli {
    /// Print debug output.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable TLS certificate verification for API calls.
    ///
    /// Only for self-hosted proxies with private certificates; never use it
    /// against the public APIs.
    #[arg(long, global = true)]
    insecure: bool,

    /// GitHub API base URL (default: https://api.github.com)
    #[arg(long, global = true, hide = true)]
    github_api: Option<String>,

    /// Cloudflare API base URL (default: https://api.cloudflare.com/client/v4)
    #[arg(long, global = true, hide = true)]
    pages_api: Option<String>,

    /// wrangler program to run (default: wrangler)
    #[arg(long, global = true)]
    wrangler: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build, publish and record a deployment, then prune old ones.
    Deploy(DeployArgs),
    /// Prune an environment; preview environments are removed entirely.
    Clean(TargetArgs),
    /// Delete a whole Pages project.
    Destroy(DestroyArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// GitHub repository as owner/repo (default: parsed from the origin remote)
    #[arg(long)]
    repository: Option<String>,

    /// Cloudflare Pages project name
    #[arg(long)]
    name: String,

    /// Environment (branch) to act on (default: the current git branch)
    #[arg(long)]
    environment: Option<String>,

    /// Branch that is deployed to production
    #[arg(long, default_value = "master")]
    head: String,

    /// Deployments kept per environment (default: 5)
    #[arg(long)]
    max_deployments: Option<usize>,
}

#[derive(Args, Debug)]
struct DeployArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Build output directory (default: dist)
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Name of an environment variable to upload as a secret (repeatable).
    #[arg(long = "secret", value_name = "NAME")]
    secrets: Vec<String>,

    /// Name of an environment variable to upload as plain text (repeatable).
    #[arg(long = "variable", value_name = "NAME")]
    variables: Vec<String>,
}

#[derive(Args, Debug)]
struct DestroyArgs {
    /// Cloudflare Pages project name
    #[arg(long)]
    name: String,

    /// Confirm the deletion.
    #[arg(long)]
    yes: bool,
}

struct CliReporter {
    verbose: bool,
    quiet: bool,
}

impl Reporter for CliReporter {
    fn debug(&mut self, msg: &str) {
        if self.verbose {
            eprintln!("[debug] {msg}");
        }
    }

    fn info(&mut self, msg: &str) {
        if !self.quiet {
            eprintln!("[info] {msg}");
        }
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut reporter = CliReporter {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match run(cli, &mut reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[fatal] {err:#}");
            if is_config_error(&err) {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: Cli, reporter: &mut dyn Reporter) -> Result<()> {
    let working_dir = env::current_dir().context("failed to read current directory")?;

    let dotenv_path = working_dir.join(".env");
    if dotenv_path.is_file() {
        dotenv::from_path(&dotenv_path)
            .with_context(|| format!("failed to load {}", dotenv_path.display()))?;
        reporter.debug(&format!("loaded {}", dotenv_path.display()));
    }

    let file = FileConfig::load(&working_dir)?;
    let mut overrides = CliOverrides {
        github_api: cli.github_api,
        pages_api: cli.pages_api,
        wrangler: cli.wrangler,
        insecure: cli.insecure,
        ..CliOverrides::default()
    };
    if cli.insecure {
        reporter.warn("TLS certificate verification is disabled");
    }

    match cli.cmd {
        Commands::Deploy(args) => {
            overrides.directory = args.directory;
            overrides.max_deployments = args.target.max_deployments;
            let settings = resolve_settings(&working_dir, file, overrides);
            deploy(&settings, args.target, &args.variables, &args.secrets, reporter)
        }
        Commands::Clean(target) => {
            overrides.max_deployments = target.max_deployments;
            let settings = resolve_settings(&working_dir, file, overrides);
            clean(&settings, target, reporter)
        }
        Commands::Destroy(args) => {
            let settings = resolve_settings(&working_dir, file, overrides);
            destroy(&settings, &args, reporter)
        }
    }
}

fn resolve_settings(working_dir: &Path, file: FileConfig, overrides: CliOverrides) -> Settings {
    Settings::resolve(
        working_dir,
        file,
        overrides,
        env::var(config::WRANGLER_BIN_VAR).ok(),
    )
}

/// Repository and environment, falling back to git metadata.
fn resolve_target(settings: &Settings, target: &TargetArgs) -> Result<(String, String)> {
    let repository = match &target.repository {
        Some(repository) => config::validate_repository(repository)?,
        None => git::remote_url(&settings.working_dir, "origin")?
            .as_deref()
            .and_then(git::parse_repository)
            .ok_or(ConfigError::Undetermined("repository"))?,
    };

    let environment = match &target.environment {
        Some(environment) => environment.clone(),
        None => git::current_branch(&settings.working_dir)?
            .ok_or(ConfigError::Undetermined("environment"))?,
    };

    Ok((repository, environment))
}

fn registries(
    settings: &Settings,
    github_token: &str,
    cloudflare: &auth::CloudflareCredentials,
) -> Result<(GithubRegistry, PagesRegistry)> {
    let github = GithubRegistry::new(ApiClient::github(
        &settings.github_base,
        github_token,
        settings.insecure,
    )?);
    let pages = PagesRegistry::new(
        ApiClient::cloudflare(&settings.pages_base, &cloudflare.api_token, settings.insecure)?,
        &cloudflare.account_id,
    );
    Ok((github, pages))
}

fn publisher(settings: &Settings, cloudflare: &auth::CloudflareCredentials) -> WranglerPublisher {
    WranglerPublisher::new(
        &settings.wrangler,
        settings.build_command.clone(),
        &settings.working_dir,
        cloudflare.wrangler_env(),
    )
}

fn deploy(
    settings: &Settings,
    target: TargetArgs,
    variables: &[String],
    secrets: &[String],
    reporter: &mut dyn Reporter,
) -> Result<()> {
    let (repository, environment) = resolve_target(settings, &target)?;
    let lookup = |name: &str| env::var(name).ok();
    let variables = config::resolve_named_values(variables, ValueKind::Variable, lookup)?;
    let secrets = config::resolve_named_values(secrets, ValueKind::Secret, lookup)?;
    let github_token = auth::resolve_github_token()?;
    let cloudflare = auth::resolve_cloudflare()?;

    let (github, pages) = registries(settings, &github_token, &cloudflare)?;
    let publisher = publisher(settings, &cloudflare);

    let req = DeployRequest {
        repository,
        project: target.name,
        environment,
        head: target.head,
        retention: settings.retention,
        directory: settings.directory.clone(),
        variables,
        secrets,
    };
    reporter.info(&format!(
        "deploying {} ({}) from {}",
        req.environment, req.project, req.repository
    ));

    let receipt = engine::run_deploy(&github, &pages, &publisher, &req, reporter)?;
    report_prune_failures(reporter, &[&receipt.github_prune, &receipt.pages_prune]);
    print_deploy_receipt(&receipt);
    Ok(())
}

fn clean(settings: &Settings, target: TargetArgs, reporter: &mut dyn Reporter) -> Result<()> {
    let (repository, environment) = resolve_target(settings, &target)?;
    let github_token = auth::resolve_github_token()?;
    let cloudflare = auth::resolve_cloudflare()?;
    let (github, pages) = registries(settings, &github_token, &cloudflare)?;

    let req = CleanRequest {
        repository,
        project: target.name,
        environment,
        head: target.head,
        retention: settings.retention,
    };
    reporter.info(&format!(
        "cleaning {} ({}) in {}",
        req.environment, req.project, req.repository
    ));

    let receipt = engine::run_clean(&github, &pages, &req, reporter)?;
    let mut reports = vec![&receipt.github_prune, &receipt.pages_prune];
    if let Some(teardown) = &receipt.teardown {
        reports.extend([&teardown.github_prune, &teardown.pages_prune]);
    }
    report_prune_failures(reporter, &reports);
    print_clean_receipt(&receipt);
    Ok(())
}

fn destroy(settings: &Settings, args: &DestroyArgs, reporter: &mut dyn Reporter) -> Result<()> {
    if !args.yes {
        return Err(ConfigError::ConfirmationRequired(args.name.clone()).into());
    }
    let cloudflare = auth::resolve_cloudflare()?;
    engine::run_destroy(&publisher(settings, &cloudflare), &args.name, reporter)?;
    println!("deleted: {}", args.name);
    Ok(())
}

/// Pruning failures do not fail the command, but they are worth a look.
fn report_prune_failures(reporter: &mut dyn Reporter, reports: &[&PruneReport]) {
    let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
    if failed > 0 {
        reporter.error(&format!(
            "{failed} record(s) could not be pruned; see warnings above"
        ));
    }
}

fn print_prune(label: &str, report: &PruneReport) {
    println!(
        "{label}: kept {}, pruned {}, failed {}",
        report.retained,
        report.pruned.len(),
        report.failed.len()
    );
}

fn print_deploy_receipt(receipt: &DeployReceipt) {
    println!("url: {}", receipt.url);
    println!(
        "deployment: {} (status {})",
        receipt.deployment_id, receipt.status_id
    );
    if receipt.project_created {
        println!("project: created");
    }
    print_prune("github", &receipt.github_prune);
    print_prune("pages", &receipt.pages_prune);
}

fn print_clean_receipt(receipt: &CleanReceipt) {
    print_prune("github", &receipt.github_prune);
    print_prune("pages", &receipt.pages_prune);

    match &receipt.teardown {
        Some(teardown) => {
            print_prune("teardown github", &teardown.github_prune);
            print_prune("teardown pages", &teardown.pages_prune);
            println!("environment deleted: {}", teardown.environment_deleted);
        }
        None => println!("environment deleted: false (production)"),
    }
}
