use std::{error::Error, ffi::OsString, time::Duration};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use respawn::{
    SharedListenerLauncher, StdioLauncher, Supervisor, SupervisorConfig,
    cli::{Cli, Commands, parse_args},
    config::{Config, load_config, parse_duration},
    demo, reuse,
    role::{self, Role},
};

fn main() -> Result<(), Box<dyn Error>> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let (role, stripped) = role::detect(argv.clone());
    let args = parse_args(stripped);
    let config = load_config(args.config.as_deref())?;
    init_logging(&args, &config);

    let workers = args.workers.or(config.workers).unwrap_or(2);
    let supervisor_config = SupervisorConfig::new().workers(workers).args(argv);

    let supervisor_config = match args.command {
        Commands::Tick { interval } => {
            let interval = match interval.or(config.tick.interval) {
                Some(raw) => parse_duration(&raw)?,
                None => demo::DEFAULT_TICK_INTERVAL,
            };
            supervisor_config
                .launcher(StdioLauncher)
                .entry(move |_| tick_worker(interval))
        }
        Commands::Serve { addr } => {
            let addr = addr
                .or(config.serve.addr)
                .unwrap_or_else(|| demo::DEFAULT_SERVE_ADDR.to_string());
            if role == Role::Orchestrator {
                info!("Workers will share a listener on {addr}");
            }
            supervisor_config
                .launcher(SharedListenerLauncher::new(addr))
                .entry(|_| serve_worker())
        }
    };

    match Supervisor::new(supervisor_config).run() {
        Ok(Some(report)) => {
            info!(
                "Supervisor stopped: {} worker(s) killed, {} respawned, {} slot(s) dropped",
                report.killed.len(),
                report.respawned,
                report.dropped
            );
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            error!("Supervisor exited with error: {err}");
            Err(err.into())
        }
    }
}

fn init_logging(args: &Cli, config: &Config) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else if let Some(level) = config.log_level.as_deref() {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn tick_worker(interval: Duration) {
    demo::tick(interval)
}

fn serve_worker() {
    let listener = match reuse::inherited_listener() {
        Ok(listener) => listener,
        Err(err) => {
            error!("Worker has no inherited listener: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = demo::serve(listener) {
        error!("Worker stopped serving: {err}");
        std::process::exit(1);
    }
}
