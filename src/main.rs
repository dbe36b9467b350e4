use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use text_patcher::config::{
    apply_patches, check_patches, discover_patch_files, load_from_path, ApplicationError,
    ApplyOptions, FileChange, PatchConfig, PatchResult, PatchStatus,
};
use text_patcher::logging::init_logging;
use text_patcher::{ApplyError, NearMiss};

/// Environment variable naming the default workspace.
const WORKSPACE_ENV: &str = "TEXT_PATCHER_WORKSPACE";

/// Longest anchor preview printed by `list`.
const PREVIEW_CHARS: usize = 60;

#[derive(Parser)]
#[command(name = "text-patcher")]
#[command(about = "Idempotent anchor-based patching for text files", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Path to workspace root (defaults to $TEXT_PATCHER_WORKSPACE, then cwd)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Specific patch file (otherwise all *.toml in patches/)
    #[arg(short, long)]
    patches: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to a workspace
    Apply {
        #[command(flatten)]
        target: Target,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Stop at the first missing anchor or error
        #[arg(long)]
        fail_fast: bool,
    },

    /// Check status of patches without applying
    Status {
        #[command(flatten)]
        target: Target,
    },

    /// Verify every patch is already applied
    Verify {
        #[command(flatten)]
        target: Target,
    },

    /// List patches and their anchors
    List {
        #[command(flatten)]
        target: Target,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply {
            target,
            dry_run,
            diff,
            fail_fast,
        } => cmd_apply(
            target,
            ApplyOptions {
                dry_run,
                fail_fast,
            },
            diff,
        ),

        Commands::Status { target } => cmd_status(target),

        Commands::Verify { target } => cmd_verify(target),

        Commands::List { target } => cmd_list(target),
    }
}

/// Resolve workspace path
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. TEXT_PATCHER_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var(WORKSPACE_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: {} is set but path doesn't exist: {}",
                WORKSPACE_ENV, env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

/// Patch files to load: the explicit file, else `<workspace>/patches`, else `./patches`.
fn resolve_patch_files(workspace: &Path, explicit: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![path]);
    }

    let mut candidates = vec![workspace.join("patches")];
    if let Ok(cwd) = env::current_dir() {
        let cwd_patches = cwd.join("patches");
        if !candidates.contains(&cwd_patches) {
            candidates.push(cwd_patches);
        }
    }

    Ok(discover_patch_files(&candidates)?)
}

fn load_target(target: Target) -> Result<(PathBuf, Vec<(PathBuf, PatchConfig)>)> {
    let workspace = resolve_workspace(target.workspace)?;
    let configs = resolve_patch_files(&workspace, target.patches)?
        .into_iter()
        .map(|file| -> Result<(PathBuf, PatchConfig)> {
            let config = load_from_path(&file)?;
            Ok((file, config))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((workspace, configs))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file_change: &FileChange) {
    let file = file_change.file.display();
    println!("\n{}", format!("--- {} (original)", file).dimmed());
    println!("{}", format!("+++ {} (patched)", file).dimmed());

    let diff = TextDiff::from_lines(&file_change.before, &file_change.after);

    for group in diff.grouped_ops(3) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = match change.tag() {
                    ChangeTag::Delete => format!("-{}", change).red(),
                    ChangeTag::Insert => format!("+{}", change).green(),
                    ChangeTag::Equal => format!(" {}", change).normal(),
                };
                print!("{}", line);
                if change.missing_newline() {
                    println!();
                }
            }
        }
    }
}

/// Helper: Print the closest match for a missing anchor
fn display_near_miss(near_miss: &Option<NearMiss>) {
    let Some(miss) = near_miss else {
        eprintln!("  No similar text found");
        return;
    };

    eprintln!(
        "  Closest match at line {} ({:.0}% similar):",
        miss.line,
        miss.similarity * 100.0
    );
    for (number, text) in &miss.context {
        let row = format!("  {:>5} | {}", number, text);
        if *number == miss.line {
            eprintln!("{}", row.yellow());
        } else {
            eprintln!("{}", row.dimmed());
        }
    }
}

fn cmd_apply(target: Target, options: ApplyOptions, show_diff: bool) -> Result<()> {
    let (workspace, configs) = load_target(target)?;

    println!("Workspace: {}", workspace.display());
    if options.dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    let mut total_applied = 0;
    let mut total_unchanged = 0;
    let mut total_not_found = 0;
    let mut total_failed = 0;
    let mut fatal: Option<String> = None;

    for (patch_file, config) in configs {
        println!("Loading patches from {}...", patch_file.display());

        let report = apply_patches(&config, &workspace, options);

        for (patch_id, result) in &report.results {
            match result {
                Ok(PatchResult::Applied { file, regions }) => {
                    let verb = if options.dry_run {
                        "Would apply"
                    } else {
                        "Applied"
                    };
                    println!(
                        "{} {}: {} to {} ({} region(s))",
                        "✓".green(),
                        patch_id,
                        verb,
                        file.display(),
                        regions
                    );
                    total_applied += 1;
                }
                Ok(PatchResult::Unchanged { file }) => {
                    println!(
                        "{} {}: Unchanged in {}",
                        "⊙".yellow(),
                        patch_id,
                        file.display()
                    );
                    total_unchanged += 1;
                }
                Ok(PatchResult::NotFound { file, near_miss }) => {
                    println!(
                        "{} {}: NOT FOUND in {}",
                        "✗".red(),
                        patch_id,
                        file.display()
                    );
                    display_near_miss(near_miss);
                    total_not_found += 1;
                }
                Err(e) => {
                    println!("{} {}: ERROR - {}", "✗".red(), patch_id, e);
                    if let ApplicationError::Apply {
                        source: ApplyError::AmbiguousAnchor { count },
                        ..
                    } = e
                    {
                        eprintln!(
                            "  {}",
                            format!("Anchor matched {} locations (expected 1)", count).red()
                        );
                        eprintln!("  Action: extend the anchor or set occurrences = \"all\"");
                    }
                    if e.is_fatal() && fatal.is_none() {
                        fatal = Some(e.to_string());
                    }
                    total_failed += 1;
                }
            }
        }

        if show_diff {
            for change in &report.changes {
                display_diff(change);
            }
        }

        println!();

        if report.aborted {
            break;
        }
    }

    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} not found", format!("{}", total_not_found).red());
    println!("  {} failed", format!("{}", total_failed).red());

    if let Some(message) = fatal {
        anyhow::bail!(message);
    }

    if total_not_found + total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(target: Target) -> Result<()> {
    let (workspace, configs) = load_target(target)?;

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut not_found = Vec::new();

    // Read-only; does not mutate workspace files
    for (_, config) in configs {
        for (patch_id, status) in check_patches(&config, &workspace) {
            match status {
                Ok(PatchStatus::AlreadyApplied { .. }) => applied.push(patch_id),
                Ok(PatchStatus::Pending { file }) => {
                    pending.push((patch_id, file.display().to_string()))
                }
                Ok(PatchStatus::NotFound { file, .. }) => {
                    not_found.push((patch_id, format!("anchor missing in {}", file.display())))
                }
                Err(e) => not_found.push((patch_id, e.to_string())),
            }
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊙".yellow(),
            "PENDING".yellow().bold(),
            pending.len()
        );
        for (id, file) in &pending {
            println!("  - {} ({})", id, file.dimmed());
        }
        println!();
    }

    if !not_found.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✗".red(),
            "NOT FOUND".red().bold(),
            not_found.len()
        );
        for (id, reason) in &not_found {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    Ok(())
}

fn cmd_verify(target: Target) -> Result<()> {
    let (workspace, configs) = load_target(target)?;

    println!("{}", "Verifying patches...".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut verified = 0;
    let mut mismatch = 0;

    for (_, config) in configs {
        for (patch_id, status) in check_patches(&config, &workspace) {
            match status {
                Ok(PatchStatus::AlreadyApplied { .. }) => {
                    println!("{} {}: Verified (already applied)", "✓".green(), patch_id);
                    verified += 1;
                }
                Ok(PatchStatus::Pending { file }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Expected: patch already applied");
                    eprintln!("  Found: anchor still present");
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Ok(PatchStatus::NotFound { file, near_miss }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Found: neither anchor nor replacement");
                    eprintln!("  Location: {}", file.display());
                    display_near_miss(&near_miss);
                    mismatch += 1;
                }
                Err(e) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Error: {}", e);
                    mismatch += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(target: Target) -> Result<()> {
    let (_, configs) = load_target(target)?;

    for (patch_file, config) in configs {
        let title = if config.meta.name.is_empty() {
            patch_file.display().to_string()
        } else {
            config.meta.name.clone()
        };
        println!("{}", title.bold());
        if let Some(description) = &config.meta.description {
            println!("  {}", description.dimmed());
        }

        for patch in &config.patches {
            println!(
                "  {} {} [{} / {}]",
                "-".dimmed(),
                patch.id,
                patch.query.kind(),
                patch.operation.kind()
            );
            println!("      file:   {}", patch.file);
            println!("      anchor: {}", preview(patch.query.anchor()).dimmed());
        }
        println!();
    }

    Ok(())
}

/// First line of an anchor, cut to `PREVIEW_CHARS`.
fn preview(anchor: &str) -> String {
    let first = anchor.lines().next().unwrap_or("");
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    if first.chars().count() > PREVIEW_CHARS || anchor.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}
