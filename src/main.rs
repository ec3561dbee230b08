use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod config;
mod error;
mod events;
mod services;
mod utils;

use config::{Config, Overrides};
use events::ExitCode;
use services::launcher::{apply_gpu_fallback, detect_gpu, GpuCheck, GpuType, LaunchPlan};
use services::notify::notify;
use services::playtime_analysis::PlaytimeReport;
use services::playtime_log::{parse_log, read_log, PlaytimeLogger};
use services::process_table::become_subreaper;
use services::{
    create_window_system, HookContext, HookRegistry, LifecycleController, ProcessTable,
    SystemProcessTable,
};
use utils::WrapperPaths;

#[derive(Parser, Debug)]
#[command(name = "optiwrapper", version)]
#[command(about = "Game wrapper: picks the GPU, tracks playtime and window focus, runs hooks")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a game
    Run(RunArgs),
    /// Summarize a playtime log
    Playtime(PlaytimeArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Game name; its settings are read from <wrapper dir>/settings/<GAME>.toml
    #[arg(short = 'G', long)]
    game: String,

    /// Hide the top bar (needed for fullscreen in some games)
    #[arg(short = 'f', long)]
    hide_top_bar: bool,

    /// Don't use discrete graphics
    #[arg(short = 'n', long)]
    no_discrete: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Also log to FILE (overwritten)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emulate the window system instead of connecting to X11
    #[arg(long)]
    dry_run: bool,

    /// Command to run instead of the configured one
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct PlaytimeArgs {
    /// Don't report invalid event combinations
    #[arg(short, long)]
    quiet: bool,

    /// Log file, game name, or - for stdin
    target: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let code = match args.command {
        Commands::Run(run) => run_game(run).await?,
        Commands::Playtime(playtime) => {
            report_playtime(playtime)?;
            0
        }
    };

    std::process::exit(code);
}

async fn run_game(args: RunArgs) -> Result<i32> {
    let paths = WrapperPaths::from_env();
    let level = if args.quiet { "warn" } else { "debug" };
    init_tracing(level, &[Some(paths.debug_log(&args.game)), args.output.clone()])?;

    info!("Starting optiwrapper v{}", env!("CARGO_PKG_VERSION"));
    if args.dry_run {
        warn!("Dry run: the window system is emulated");
    }

    let mut config = match Config::load(&args.game, paths.settings_file(&args.game)) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return Ok(ExitCode::Killed.code());
        }
    };
    config.apply_overrides(Overrides {
        command: args.command,
        use_gpu: args.no_discrete.then_some(false),
        hide_top_bar: args.hide_top_bar,
    });
    if let Err(e) = config.validate() {
        error!("{:#}", e);
        return Ok(ExitCode::Killed.code());
    }

    become_subreaper();

    let gpu = if args.dry_run {
        GpuType::Unknown
    } else {
        let gpu = detect_gpu(config.flags.use_gpu);
        match apply_gpu_fallback(&mut config.flags, gpu) {
            GpuCheck::Ready => {}
            GpuCheck::FellBack => {
                notify("Discrete GPU not working, falling back to integrated GPU").await
            }
            GpuCheck::Unavailable => {
                notify("Discrete GPU not working, quitting").await;
                return Ok(ExitCode::NoGpu.code());
            }
        }
        gpu
    };
    debug!("GPU: {}", gpu);
    crate::debug_if_enabled!("configuration: {:#?}", config);

    let window_system = match create_window_system(args.dry_run) {
        Ok(system) => Some(system),
        Err(e) => {
            warn!("Cannot reach the window system: {}", e);
            None
        }
    };
    let window_manager = window_system.as_ref().and_then(|system| system.window_manager());
    match &window_manager {
        Some(name) => debug!("window manager: {}", name),
        None => debug!("not in WM"),
    }

    let config = Arc::new(config);
    let processes: Arc<dyn ProcessTable> = Arc::new(SystemProcessTable::new());

    let context = HookContext {
        config: config.clone(),
        window_manager: window_manager.clone(),
        processes: processes.clone(),
    };
    let mut hooks = HookRegistry::discover();
    if let Err(e) = hooks.load_all(&config.hooks, &context) {
        error!("{}", e);
        return Ok(ExitCode::Killed.code());
    }
    hooks.initialize_all().await;

    let plan = LaunchPlan::build(&config, gpu, tracing::enabled!(tracing::Level::DEBUG));
    debug!("command: {}", plan);
    debug!("CWD: {:?}", std::env::current_dir().unwrap_or_default());

    let logger = PlaytimeLogger::new(paths.time_log(&config.game))?;
    let mut controller = LifecycleController::new(config, plan, logger, hooks, processes);
    if let (Some(system), Some(_)) = (window_system, window_manager) {
        controller = controller.with_window_system(system);
    }

    match controller.run().await {
        Ok(code) => Ok(code.code()),
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::Killed.code())
        }
    }
}

fn report_playtime(args: PlaytimeArgs) -> Result<()> {
    init_tracing(if args.quiet { "error" } else { "info" }, &[])?;

    let entries = if args.target == "-" {
        let mut contents = String::new();
        std::io::stdin().read_to_string(&mut contents)?;
        parse_log(&contents)?
    } else {
        let path = if Path::new(&args.target).is_file() {
            PathBuf::from(&args.target)
        } else {
            WrapperPaths::from_env().time_log(&args.target)
        };
        read_log(&path).with_context(|| format!("Cannot read {:?}", path))?
    };

    let report = PlaytimeReport::from_entries(&entries, !args.quiet)?;
    println!("{}", report);
    Ok(())
}

fn init_tracing(level: &str, log_files: &[Option<PathBuf>]) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,optiwrapper={level}")))?;

    let mut files = Vec::new();
    for path in log_files.iter().flatten() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path).with_context(|| format!("Cannot create log file {:?}", path))?;
        files.push(Arc::new(file));
    }
    let mut files = files.into_iter();
    let first = files.next();
    let second = files.next();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .with(first.map(|file| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file)))
        .with(second.map(|file| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file)))
        .init();

    Ok(())
}
