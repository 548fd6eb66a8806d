use std::{error::Error, fs, path::Path};

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use parca_operator::{
    charm::{InstallMarker, ParcaCharm},
    cli::{Cli, Commands, parse_args},
    config::{CharmConfig, Settings, load_settings},
    error::CharmError,
    event::Event,
    parca_config::{ParcaConfig, parca_command_line},
    platform::HookTools,
    reconciler::{DispatchLock, Reconciler},
    runner::ShellRunner,
    scrape::{MetricsEndpointConsumer, ScrapeJob},
    workload::Parca,
};

type OperatorReconciler = Reconciler<
    Parca<ShellRunner>,
    MetricsEndpointConsumer<HookTools<ShellRunner>>,
    HookTools<ShellRunner>,
>;

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    run(&args).inspect_err(|err| error!("{err}"))?;
    Ok(())
}

fn run(args: &Cli) -> Result<(), CharmError> {
    let settings = load_settings(args.settings.as_deref())?;

    match &args.command {
        Commands::Dispatch { .. } => {
            let Some(hook) = args.command.hook() else {
                return Err(CharmError::MissingHook);
            };

            match Event::from_hook(hook, &settings.metrics_relation) {
                Some(event) => {
                    info!("Dispatching hook '{hook}' as {event}");
                    run_events(&settings, &[event])?;
                }
                None => debug!("Hook '{hook}' is not observed; nothing to do"),
            }
        }
        Commands::Replay { events } => {
            let status = run_events(&settings, events)?;
            info!("Final unit status: {status}");
        }
        Commands::Render { jobs, config } => {
            let jobs: Vec<ScrapeJob> = match jobs {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let config: CharmConfig = match config {
                Some(path) => read_json(path)?,
                None => CharmConfig::default(),
            };

            let parca = &settings.parca;
            print!(
                "{}",
                ParcaConfig::new(jobs, &parca.profile_path).to_yaml()?
            );
            println!(
                "# {}",
                parca_command_line(
                    &config,
                    &parca.bin_path,
                    &parca.config_path,
                    &parca.profile_path
                )
                .join(" ")
            );
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::default().add_directive(level.filter().into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Handles `events` in order while holding the dispatch lock.
fn run_events(
    settings: &Settings,
    events: &[Event],
) -> Result<parca_operator::status::UnitStatus, CharmError> {
    let _lock = DispatchLock::acquire(&settings.lock_path)?;
    let mut reconciler = build_reconciler(settings)?;
    for event in events {
        reconciler.enqueue(*event);
    }
    reconciler.run()
}

fn build_reconciler(settings: &Settings) -> Result<OperatorReconciler, CharmError> {
    let runner = ShellRunner::new(settings.command_timeout()?);
    let workload = Parca::new(settings.parca.clone(), runner.clone());
    let discovery = MetricsEndpointConsumer::new(
        HookTools::new(runner.clone()),
        settings.metrics_relation.clone(),
    );
    let charm = ParcaCharm::new(workload, discovery, HookTools::new(runner), settings.port)
        .with_install_marker(InstallMarker::new(settings.install_marker_path.clone()))?;
    Ok(Reconciler::new(charm))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CharmError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
