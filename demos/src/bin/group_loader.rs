//! Loads resource groups from a definition source and reports every event.
//!
//! ```text
//! group_loader --data-dir data --source menus/main.toml --auto-detect --group menu
//! group_loader --source ./game.toml --group level1 --group hud --threaded --unload
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use cairn_demos::{FileResource, log_event};
use cairn_resources::{ResourceEvent, ResourceManager, ResourceManagerConfig, ThreadingModel};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "group_loader",
    about = "Load Cairn resource groups and log their progress",
    version
)]
struct Args {
    /// Data directory to search, in order. Repeatable.
    #[arg(long = "data-dir")]
    data_dirs: Vec<PathBuf>,

    /// Definition source to register.
    #[arg(long)]
    source: String,

    /// Search the data directories for the source instead of reading it as a path.
    #[arg(long)]
    auto_detect: bool,

    /// Group to load. Repeatable.
    #[arg(long = "group", required = true)]
    groups: Vec<String>,

    /// Run resource operations on the worker thread.
    #[arg(long)]
    threaded: bool,

    /// Manager configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Unload the groups again after they finished loading.
    #[arg(long)]
    unload: bool,

    /// Seconds to wait for the scheduler to go idle.
    #[arg(long, default_value = "30")]
    timeout: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            log::error!("{failures} group operations failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<usize, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ResourceManagerConfig::load(path)?,
        None => ResourceManagerConfig::default(),
    };
    if args.threaded {
        config.threading = ThreadingModel::MultiThread;
    }
    config.data_directories.extend(args.data_dirs.iter().cloned());
    let roots = config.data_directories.clone();

    let mut manager = ResourceManager::new(config)?;
    log::info!(
        "group_loader {} ({:?})",
        cairn_demos::VERSION,
        manager.threading()
    );
    manager.register_resource_type("file", move || Box::new(FileResource::new(roots.clone())));

    let failures = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&failures);
    manager.subscribe(move |_, event| {
        log_event(event);
        if let ResourceEvent::GroupLoaded { result: Err(_), .. }
        | ResourceEvent::GroupUnloaded { result: Err(_), .. } = event
        {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    });

    manager.add_resources(&args.source, args.auto_detect)?;
    let budget = Duration::from_secs(args.timeout);

    for group in &args.groups {
        manager.load_group(group)?;
    }
    manager.wait_idle(budget)?;

    if args.unload {
        for group in &args.groups {
            manager.unload_group(group)?;
        }
        manager.wait_idle(budget)?;
    }

    Ok(failures.load(std::sync::atomic::Ordering::Relaxed))
}
