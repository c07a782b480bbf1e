use dotenv::dotenv;
use shipsim::config::EnvConfig;
use shipsim::env::{AgentStepController, BaselinePolicy, Runner};
use shipsim::infra::{EpisodeLog, LoggingObserver, TcpDynamicsBridge};
use shipsim::reward::RewardShaper;
use shipsim::scenario::{ScenarioCatalog, ScenarioManager};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shipsim=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = EnvConfig::from_env()?;
    let catalog = match &config.scenarios {
        Some(path) => ScenarioCatalog::load(path)?,
        None => ScenarioCatalog::builtin(),
    };
    tracing::info!(
        "Loaded {} scenarios for {} agents on {}:{}",
        catalog.len(),
        config.agents,
        config.host,
        config.base_port
    );

    let mut manager = ScenarioManager::new(catalog, config.agents, config.seed)?;
    manager.select_scenario()?;
    let manager = manager.into_shared();

    let mut controllers = Vec::with_capacity(config.agents);
    for agent in 0..config.agents {
        let bridge = TcpDynamicsBridge::connect(
            &config.host,
            config.base_port,
            agent,
            config.response_timeout,
        )
        .await?;
        controllers.push(AgentStepController::new(
            agent,
            bridge,
            manager.clone(),
            RewardShaper::new(config.reward.clone()),
            config.controller.clone(),
            LoggingObserver,
        ));
    }

    let mut runner = Runner::new(
        controllers,
        manager,
        BaselinePolicy::default(),
        config.runner(),
    );
    if let Some(folder) = &config.episode_log_dir {
        let log = EpisodeLog::create(folder, "shipsim")?;
        tracing::info!("Logging episodes to {}", log.path().display());
        runner = runner.with_episode_log(log);
    }

    let mut rotations = runner.subscribe();
    let episodes = config.episodes;
    tokio::spawn(async move {
        while rotations.changed().await.is_ok() {
            tracing::info!("Scenario rotation {}/{}", *rotations.borrow(), episodes);
        }
    });

    tokio::select! {
        result = runner.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::warn!("Interrupted, stopping run"),
    }

    runner.metrics().print_summary();
    Ok(())
}
