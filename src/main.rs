//! ClaudeStep command line drivers.
//!
//! Thin wrappers over the library for use from CI workflows and by hand.

use anyhow::Context as _;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use claudestep::reconcile::TaskReconciler;
use claudestep::stats::total_cost;
use claudestep::{
    format_branch_name, generate_task_hash, generate_task_id, summarize_projects, AIOperation,
    BranchMetadataStore, Checklist, GhCli, HostingApi, MetadataStore, OperationType, PrState,
    ProjectConfiguration, ProjectPaths, PullRequest, ReviewerCapacityAssignor, Settings, StepError,
    TaskHash, TaskRef, TaskStatus,
};

#[derive(Parser)]
#[command(name = "claudestep")]
#[command(version)]
#[command(about = "Track checklist tasks, pull requests and AI cost", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Repository checkout holding claude-step/<project>/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Settings file (defaults to claudestep.toml in the checkout)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository as owner/name
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// Metadata branch
    #[arg(long, global = true, env = "CLAUDESTEP_METADATA_BRANCH")]
    metadata_branch: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the task hash and slug of a description
    Hash {
        description: String,

        /// Maximum slug length
        #[arg(long, default_value = "30")]
        max_length: usize,
    },

    /// Show the next task without an open pull request, its branch and base branch
    NextTask {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        json: bool,
    },

    /// Pick a reviewer with spare capacity
    Reviewer {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        json: bool,
    },

    /// List open pull requests that match no current task
    Orphans {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        json: bool,
    },

    /// Show a project's tasks and pull requests
    Status {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        json: bool,
    },

    /// List stored projects
    List,

    /// Progress and cost across projects
    Statistics {
        /// Only projects updated in the last N days
        #[arg(long)]
        days_back: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Record a newly opened pull request
    RecordPr {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        task_index: u32,

        #[arg(long)]
        pr_number: u64,

        #[arg(long)]
        reviewer: String,

        /// Branch name (defaults to the task's hash-based branch)
        #[arg(long)]
        branch: Option<String>,

        #[arg(long)]
        title: Option<String>,
    },

    /// Append an AI cost record to a pull request
    RecordOperation {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        pr_number: u64,

        #[arg(long, value_enum)]
        kind: OperationKind,

        #[arg(long)]
        model: String,

        #[arg(long)]
        cost_usd: f64,

        #[arg(long, env = "GITHUB_RUN_ID")]
        workflow_run_id: u64,

        #[arg(long, default_value = "0")]
        tokens_input: u64,

        #[arg(long, default_value = "0")]
        tokens_output: u64,

        #[arg(long, default_value = "0")]
        duration_seconds: f64,
    },

    /// Update a pull request's state
    SetPrState {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        pr_number: u64,

        #[arg(long, value_enum)]
        state: StateArg,
    },

    /// Show which open pull requests still use index-based branches
    MigrateStatus {
        #[arg(short, long)]
        project: String,
    },

    /// Delete a project's metadata
    Delete {
        #[arg(short, long)]
        project: String,

        /// Confirm deletion
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OperationKind {
    Creation,
    Refinement,
    Summary,
}

impl From<OperationKind> for OperationType {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Creation => Self::Creation,
            OperationKind::Refinement => Self::Refinement,
            OperationKind::Summary => Self::Summary,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StateArg {
    Open,
    Closed,
    Merged,
}

impl From<StateArg> for PrState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Open => Self::Open,
            StateArg::Closed => Self::Closed,
            StateArg::Merged => Self::Merged,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "claudestep=debug,info"
    } else {
        "claudestep=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        let code = err.downcast_ref::<StepError>().map_or(1, StepError::exit_code);
        std::process::exit(code);
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| Settings::default_path(&cli.root));
    Ok(Settings::load(&path)?.with_overrides(cli.repo.clone(), cli.metadata_branch.clone()))
}

fn connect(settings: &Settings) -> anyhow::Result<GhCli> {
    let binary = settings.github.gh_binary.as_deref().unwrap_or("gh");
    let hosting = GhCli::locate(settings.repo()?, binary)?;
    Ok(hosting.with_label(settings.github.label.clone()))
}

fn open_store<'a>(settings: &Settings, hosting: &'a GhCli) -> BranchMetadataStore<&'a GhCli> {
    BranchMetadataStore::new(hosting, settings.store.branch.clone())
        .with_base_path(settings.store.base_path.clone())
        .with_retry_policy(settings.store.retry_policy())
}

fn hash_branch(project: &str, hash: &TaskHash) -> String {
    format_branch_name(project, &TaskRef::ByHash(hash.clone()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Hash {
        description,
        max_length,
    } = &cli.command
    {
        println!("{}", generate_task_hash(description));
        println!("{}", generate_task_id(description, *max_length));
        return Ok(());
    }

    let settings = load_settings(&cli)?;
    let hosting = connect(&settings)?;
    let store = open_store(&settings, &hosting);

    match cli.command {
        Commands::Hash { .. } => {}

        Commands::NextTask { project, json } => {
            let paths = ProjectPaths::new(&cli.root, project.as_str());
            let checklist = Checklist::load(&paths.spec_file())?;
            let config = ProjectConfiguration::load_if_present(&paths)?;
            let base_branch = settings.base_branch_for(config.as_ref());
            let metadata = store.get_project(&project)?;
            let reconciler = TaskReconciler::new(&hosting, project.as_str());
            let next = reconciler.next_available_task(&checklist, metadata.as_ref());

            if json {
                let branch = next.as_ref().map(|task| hash_branch(&project, &task.hash));
                print_json(&serde_json::json!({
                    "task": next,
                    "branch": branch,
                    "base_branch": base_branch,
                }))?;
            } else {
                match next {
                    Some(task) => {
                        let next_label = "Next:".cyan().bold();
                        println!("{} Task {}: {}", next_label, task.index, task.description);
                        println!("   Hash:   {}", task.hash);
                        println!("   Branch: {}", hash_branch(&project, &task.hash));
                        println!("   Base:   {}", base_branch);
                    }
                    None => println!(
                        "{} No available tasks for {}",
                        "Done:".green().bold(),
                        project
                    ),
                }
            }
        }

        Commands::Reviewer { project, json } => {
            let paths = ProjectPaths::new(&cli.root, project.as_str());
            let config = ProjectConfiguration::load(&paths)?;
            let metadata = store.get_project(&project)?;
            let assignor = ReviewerCapacityAssignor::new(&config);

            let report = match hosting.list_open_pull_requests(&project) {
                Ok(open) => assignor.assign(&open, metadata.as_ref()),
                Err(e) => {
                    tracing::warn!(
                        "Pull request listing unavailable ({}), using stored assignments",
                        e
                    );
                    match &metadata {
                        Some(metadata) => assignor.assign_from_metadata(metadata),
                        None => assignor.assign(&[], None),
                    }
                }
            };

            if json {
                print_json(&report)?;
            } else {
                println!("\n{} {}", "Reviewers:".cyan().bold(), project);
                println!("{}", "─".repeat(40));
                println!("{report}");
            }
        }

        Commands::Orphans { project, json } => {
            let paths = ProjectPaths::new(&cli.root, project.as_str());
            let checklist = Checklist::load(&paths.spec_file())?;
            let metadata = store.get_project(&project)?;
            let reconciler = TaskReconciler::new(&hosting, project.as_str());
            let orphans = reconciler.detect_orphaned_prs(&checklist, metadata.as_ref());

            if json {
                print_json(&orphans)?;
            } else if orphans.is_empty() {
                println!("{} No orphaned pull requests", "OK".green().bold());
            } else {
                println!(
                    "\n{} {} orphaned pull request(s)",
                    "Warning:".yellow().bold(),
                    orphans.len()
                );
                for orphan in &orphans {
                    println!("   #{} {} ({})", orphan.number, orphan.branch_name, orphan.reason);
                }
            }
        }

        Commands::Status { project, json } => {
            let metadata = store
                .get_project(&project)?
                .with_context(|| format!("no metadata stored for {project}"))?;

            if json {
                print_json(&metadata)?;
            } else {
                let stats = metadata.progress_stats();
                println!("\n{} {}", "Project:".cyan().bold(), metadata.project);
                println!("{}", "─".repeat(40));
                println!("   Last updated: {}", metadata.last_updated.to_rfc3339());
                println!(
                    "   Progress: {}/{} ({:.1}%)",
                    stats.completed,
                    stats.total,
                    metadata.completion_percentage()
                );
                println!("   Total cost: ${:.2}", metadata.total_cost());
                println!();
                for task in &metadata.tasks {
                    let label = match task.status {
                        TaskStatus::Completed => task.status.label().green(),
                        TaskStatus::InProgress => task.status.label().yellow(),
                        TaskStatus::Pending => task.status.label().normal(),
                    };
                    println!("   {:>3}. [{}] {}", task.index, label, task.description);
                }
                let open: Vec<_> = metadata.open_pull_requests().collect();
                if !open.is_empty() {
                    println!("\n   Open pull requests:");
                    for pr in open {
                        println!("   #{} task {} ({})", pr.pr_number, pr.task_index, pr.reviewer);
                    }
                }
            }
        }

        Commands::List => {
            for name in store.list_project_names()? {
                println!("{name}");
            }
        }

        Commands::Statistics { days_back, json } => {
            let since = days_back.map(|days| Utc::now() - Duration::days(days));
            let summaries = summarize_projects(&store, since)?;

            if json {
                print_json(&summaries)?;
            } else {
                println!("\n{} {} project(s)", "Statistics:".cyan().bold(), summaries.len());
                println!("{}", "─".repeat(60));
                for s in &summaries {
                    println!(
                        "   {:<24} {:>3}/{:<3} {:>5.1}%  open {:>2}  ${:.2}",
                        s.project,
                        s.progress.completed,
                        s.progress.total,
                        s.completion_percentage,
                        s.open_prs,
                        s.total_cost_usd
                    );
                }
                println!("{}", "─".repeat(60));
                println!("   Total cost: ${:.2}", total_cost(&summaries));
            }
        }

        Commands::RecordPr {
            project,
            task_index,
            pr_number,
            reviewer,
            branch,
            title,
        } => {
            let paths = ProjectPaths::new(&cli.root, project.as_str());
            let checklist = Checklist::load(&paths.spec_file())?;
            let item = checklist
                .get(task_index)
                .with_context(|| format!("{project} has no task {task_index}"))?;
            let branch = branch.unwrap_or_else(|| hash_branch(&project, &item.hash));

            let mut pr = PullRequest::new(task_index, pr_number, branch, reviewer, Utc::now());
            if let Some(title) = title {
                pr = pr.with_title(title);
            }

            store.ensure_branch_exists()?;
            store.update(&project, &mut |metadata| {
                metadata.sync_tasks_from_checklist(&checklist);
                metadata.add_pull_request(pr.clone());
                Ok(())
            })?;
            println!(
                "{} Recorded PR #{} for task {}",
                "OK".green().bold(),
                pr_number,
                task_index
            );
        }

        Commands::RecordOperation {
            project,
            pr_number,
            kind,
            model,
            cost_usd,
            workflow_run_id,
            tokens_input,
            tokens_output,
            duration_seconds,
        } => {
            let operation =
                AIOperation::new(kind.into(), model, cost_usd, Utc::now(), workflow_run_id)
                    .with_tokens(tokens_input, tokens_output)
                    .with_duration(duration_seconds);

            store.update(&project, &mut |metadata| {
                metadata.record_ai_operation(pr_number, operation.clone())
            })?;
            let ok = "OK".green().bold();
            println!("{} Recorded ${:.4} on PR #{}", ok, cost_usd, pr_number);
        }

        Commands::SetPrState {
            project,
            pr_number,
            state,
        } => {
            let state = PrState::from(state);
            store.update(&project, &mut |metadata| metadata.set_pr_state(pr_number, state))?;
            println!("{} PR #{} is now {}", "OK".green().bold(), pr_number, state);
        }

        Commands::MigrateStatus { project } => {
            let status = TaskReconciler::new(&hosting, project.as_str()).migration_status()?;
            println!("\n{} {}", "Migration:".cyan().bold(), project);
            println!("{}", "─".repeat(40));
            println!("   Hash-based:  {}", status.hash_based.len());
            println!("   Index-based: {}", status.index_based.len());
            for number in &status.index_based {
                println!("     #{number}");
            }
            if status.is_complete() {
                let ok = "OK".green().bold();
                println!("{} All open pull requests use hash-based branches", ok);
            }
        }

        Commands::Delete { project, force } => {
            if !force {
                eprintln!(
                    "{} This deletes all metadata for {} from {}. Use --force to confirm.",
                    "Warning:".yellow().bold(),
                    project,
                    settings.store.branch
                );
                std::process::exit(1);
            }
            store.delete(&project)?;
            println!("{} Deleted metadata for {}", "OK".green().bold(), project);
        }
    }

    Ok(())
}
