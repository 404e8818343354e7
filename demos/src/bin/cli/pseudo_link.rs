//! pseudo-link: create unprivileged pseudo-symlinks and registry links from the command line
//!
//! Links live as long as the process: they are created, their status is printed, and they are
//! torn down when you press Enter (or immediately with `--once`). Pass `--keep` to leave them in
//! place and exit.
//!
//! Examples:
//!   pseudo-link file --target C:\Users\me\real.txt C:\app\config\settings.json
//!   pseudo-link registry HKCU\Software\Vendor\Alias HKCU\Software\Vendor\Real --keep
//!   pseudo-link show junction C:\app\config
//!   pseudo-link --simulate --json file --target C:\t.txt C:\a\b\link --once
//!
//! Set `RUST_LOG=pseudo_symlink=debug` to see every native call.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pseudo_symlink::platform::MemoryPlatform;
use pseudo_symlink::{
    Conflict, ConflictPolicy, Junction, LinkConfig, LinkGroup, LinkGuard, LinkStatus,
    ObjectNamespaceLink, RegistryLink, Session,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "pseudo-link")]
#[command(about = "Unprivileged pseudo symbolic links on Windows")]
struct Cli {
    /// JSON file with engine settings (staging root, conflict policy, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Replace conflicting directories, junctions and keys without asking
    #[arg(long, global = true)]
    force: bool,
    /// Refuse conflicts instead of asking on stdin (or apply the config's policy)
    #[arg(long, global = true)]
    no_prompt: bool,
    /// Run against an in-memory platform instead of the OS
    #[arg(long, global = true)]
    simulate: bool,
    /// Print status as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link one or more file paths to a single target
    File {
        /// File the links resolve to
        #[arg(short, long)]
        target: String,
        /// Link paths (`<directory>\<name>`)
        #[arg(required = true)]
        links: Vec<PathBuf>,
        #[command(flatten)]
        lifetime: Lifetime,
    },
    /// Link a registry key to another key
    Registry {
        /// Key to create (`HKCU\...`, `HKLM:\...`, `\Registry\...`)
        link: String,
        /// Key the link resolves to
        target: String,
        #[command(flatten)]
        lifetime: Lifetime,
    },
    /// Print the current target of an existing object
    Show {
        #[arg(value_enum)]
        kind: ShowKind,
        /// Directory, staging entry name or registry key
        path: String,
    },
}

#[derive(clap::Args)]
struct Lifetime {
    /// Leave the links in place on exit
    #[arg(long)]
    keep: bool,
    /// Tear down right after creating instead of waiting for Enter
    #[arg(long, conflicts_with = "keep")]
    once: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowKind {
    Junction,
    Device,
    Registry,
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pseudo_symlink=info")),
        )
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let session = build_session(&cli)?;

    match cli.command {
        Commands::File {
            target,
            links,
            lifetime,
        } => {
            let mut link = session.symlink();
            for path in &links {
                link.add_link(path)
                    .with_context(|| format!("adding link {}", path.display()))?;
            }
            link.set_target(target);
            let mut group = session.group();
            group.add(link);
            hold(group, &lifetime, cli.json)
        }
        Commands::Registry {
            link,
            target,
            lifetime,
        } => {
            let mut group = session.group();
            group.add(session.registry_link(&link, &target)?);
            hold(group, &lifetime, cli.json)
        }
        Commands::Show { kind, path } => {
            let current = match kind {
                ShowKind::Junction => Junction::get_target(session.platform(), Path::new(&path))?,
                ShowKind::Device => ObjectNamespaceLink::get_target(&session, &path)?,
                ShowKind::Registry => RegistryLink::get_link_target(&session, &path)?,
            };
            match current {
                Some(target) => println!("{path} -> {target}"),
                None => println!("{path}: not a link"),
            }
            Ok(())
        }
    }
}

fn build_session(cli: &Cli) -> Result<Session> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<LinkConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => LinkConfig::default(),
    };
    if cli.force {
        config.on_conflict = ConflictPolicy::Replace;
    }

    let session = if cli.simulate {
        Session::with_config(Arc::new(MemoryPlatform::new()), config)
    } else {
        native_session(config)?
    };

    if !cli.force && !cli.no_prompt {
        Ok(session.with_prompt(ask))
    } else {
        Ok(session)
    }
}

#[cfg(windows)]
fn native_session(config: LinkConfig) -> Result<Session> {
    Ok(Session::native(config))
}

#[cfg(not(windows))]
fn native_session(_config: LinkConfig) -> Result<Session> {
    bail!("native links need Windows; rerun with --simulate")
}

fn ask(conflict: &Conflict) -> bool {
    eprint!("{conflict}. Replace it? [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn hold(mut group: LinkGroup, lifetime: &Lifetime, json: bool) -> Result<()> {
    group.set_keep_alive(lifetime.keep);
    let guard = LinkGuard::open(group)?;

    for (resource, error) in guard.opened().failures() {
        eprintln!("failed: {resource}: {error}");
    }
    print_status(&guard.status(), json)?;
    if !guard.opened().is_success() && guard.opened().created_count() == 0 {
        bail!("no link could be created");
    }

    if lifetime.keep {
        info!("leaving links in place");
        return Ok(());
    }
    if !lifetime.once {
        eprintln!("Links are live. Press Enter to remove them.");
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("waiting for Enter")?;
    }

    let closed = guard.close()?;
    for (resource, error) in closed.failures() {
        eprintln!("failed to remove {resource}: {error}");
    }
    info!(removed = closed.removed_count(), "links torn down");
    Ok(())
}

fn print_status(status: &[LinkStatus], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }
    for entry in status {
        let kind = entry.kind.to_string();
        let owner = if entry.owned() { "owned" } else { "existing" };
        println!(
            "{kind:<9} {} -> {} ({owner})",
            entry.link_path, entry.target_path
        );
    }
    Ok(())
}
