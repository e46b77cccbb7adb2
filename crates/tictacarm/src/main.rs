//! tictacarm - Unified CLI
//!
//! Drives the tic-tac-toe arm and the cube sorting station.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, SortCommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tictacarm::{
    ArmConfig, BoardPerception, ColorCalibration, CommandDetector, ConsoleOperator, CubeColor,
    GameOrchestrator, ObjectDetector, Operator, Rig, ScriptedDetector, SortingStation,
    VisionBoardReader, VisionClient, VisionConfig, load_roi_samples, resolve_api_key,
    until_interrupted,
};
use tictacarm_rules::Side;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing();

    let config = ArmConfig::load_or_default(&cli.config)?;

    match cli.command.unwrap_or(Command::Menu) {
        Command::Menu => run_menu(&config, cli.simulate, cli.seed).await,
        Command::Calibrate => run_calibrate(&config, cli.simulate).await,
        Command::TestPositions => run_test_positions(&config, cli.simulate).await,
        Command::Play { games } => run_play(&config, cli.simulate, cli.seed, games).await,
        Command::Sort { command } => match command {
            SortCommand::Run { cycles } => run_sort(&config, cli.simulate, cycles).await,
            SortCommand::Calibrate { color, roi } => run_sort_calibrate(&config, color, &roi),
            SortCommand::TestMoves => run_sort_test_moves(&config, cli.simulate).await,
        },
    }
}

/// Initialize tracing for all modes
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tictacarm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!(seed, "Seeding robot move choice");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Vision-backed board reader on the rig's camera.
async fn board_reader(config: &ArmConfig, rig: &Rig, operator: &dyn Operator) -> Result<VisionBoardReader> {
    let provider = *config.vision().provider();
    let api_key = resolve_api_key(provider, operator).await?;
    let client = VisionClient::new(VisionConfig::new(config.vision(), api_key))?;
    Ok(VisionBoardReader::new(rig.camera(), client))
}

/// Interactive menu, as on the rig's console.
#[instrument(skip(config))]
async fn run_menu(config: &ArmConfig, simulate: bool, seed: Option<u64>) -> Result<()> {
    let operator = ConsoleOperator;
    let rig = Rig::start(config, config.joints(), simulate);

    let menu = async {
        let mut perception: Option<VisionBoardReader> = None;
        let mut rng = rng(seed);
        loop {
            operator.say("\n=== Robot Tic-Tac-Toe Menu ===");
            operator.say("1. Calibrate servos");
            operator.say("2. Test positions");
            operator.say("3. Play tic-tac-toe");
            operator.say("4. Exit");
            let Some(choice) = operator.ask("Enter your choice (1-4): ").await else {
                break;
            };

            let result = match choice.trim() {
                "1" => config
                    .sequencer(rig.actuator())
                    .calibration_sweep(config.calibration())
                    .await
                    .map_err(anyhow::Error::from),
                "2" => test_positions(config, &rig).await,
                "3" => {
                    if perception.is_none() {
                        match board_reader(config, &rig, &operator).await {
                            Ok(reader) => perception = Some(reader),
                            Err(e) => {
                                warn!(error = %e, "Board perception unavailable");
                                operator.say(&format!("Cannot play: {}", e));
                                continue;
                            }
                        }
                    }
                    match &perception {
                        Some(reader) => play_games(config, &rig, reader, &operator, &mut rng, None).await,
                        None => Ok(()),
                    }
                }
                "4" => break,
                _ => {
                    operator.say("Invalid choice. Please try again.");
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "Menu action failed");
                operator.say(&format!("Error: {}", e));
            }
        }
    };
    until_interrupted(menu, ctrl_c()).await;

    rig.shutdown(&config.poses().home, config.motion()).await;
    Ok(())
}

async fn run_calibrate(config: &ArmConfig, simulate: bool) -> Result<()> {
    let rig = Rig::start(config, config.joints(), simulate);
    let sweep = async {
        config
            .sequencer(rig.actuator())
            .calibration_sweep(config.calibration())
            .await
    };
    let result = until_interrupted(sweep, ctrl_c()).await;
    rig.shutdown(&config.poses().home, config.motion()).await;
    Ok(result.unwrap_or(Ok(()))?)
}

async fn run_test_positions(config: &ArmConfig, simulate: bool) -> Result<()> {
    let rig = Rig::start(config, config.joints(), simulate);
    let result = until_interrupted(test_positions(config, &rig), ctrl_c()).await;
    rig.shutdown(&config.poses().home, config.motion()).await;
    result.unwrap_or(Ok(()))
}

/// Visits every board cell, then both storage areas.
async fn test_positions(config: &ArmConfig, rig: &Rig) -> Result<()> {
    let sequencer = config.sequencer(rig.actuator());
    let cells: Vec<_> = config.poses().board.iter().flatten().cloned().collect();
    info!("Testing board positions");
    sequencer.tour(&cells, config.calibration()).await?;
    for side in [Side::Player, Side::Robot] {
        info!(%side, "Testing storage positions");
        sequencer
            .tour_storage(config.poses(), side, config.calibration())
            .await?;
    }
    Ok(())
}

async fn run_play(config: &ArmConfig, simulate: bool, seed: Option<u64>, games: Option<usize>) -> Result<()> {
    let operator = ConsoleOperator;
    let rig = Rig::start(config, config.joints(), simulate);
    let play = async {
        let reader = board_reader(config, &rig, &operator).await?;
        let mut rng = rng(seed);
        play_games(config, &rig, &reader, &operator, &mut rng, games).await
    };
    let result = until_interrupted(play, ctrl_c()).await;
    rig.shutdown(&config.poses().home, config.motion()).await;
    result.unwrap_or(Ok(()))
}

/// Plays `games` games, or asks after each one when `None`.
async fn play_games(
    config: &ArmConfig,
    rig: &Rig,
    perception: &dyn BoardPerception,
    operator: &dyn Operator,
    rng: &mut StdRng,
    games: Option<usize>,
) -> Result<()> {
    let mut game = GameOrchestrator::new(
        perception,
        config.sequencer(rig.actuator()),
        config.poses(),
        operator,
        config.game().clone(),
        rng,
    );
    let mut played = 0;
    loop {
        let report = game.play().await;
        played += 1;
        operator.say(&format!("\n{}", report.outcome));

        let more = match games {
            Some(limit) => played < limit,
            None => operator.confirm("Play again?").await,
        };
        if !more {
            return Ok(());
        }
        game.reset();
    }
}

#[instrument(skip(config))]
async fn run_sort(config: &ArmConfig, simulate: bool, cycles: Option<usize>) -> Result<()> {
    let sorting = config.sorting();
    let calibration = ColorCalibration::load_or_default(sorting.calibration_file())?;
    let detector: Box<dyn ObjectDetector> = if sorting.detector_command().is_empty() {
        warn!("No detector command configured, nothing will be detected");
        Box::new(ScriptedDetector::default())
    } else {
        Box::new(CommandDetector::new(
            sorting.detector_command(),
            sorting.detector_timeout(),
            *sorting.min_area(),
        )?)
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let rig = Rig::start(config, sorting.joints(), simulate);
    let result = {
        let mut station = SortingStation::new(rig.actuator(), detector.as_ref(), sorting, calibration);
        station.run(cycles, &stop).await
    };
    rig.shutdown(sorting.home(), sorting.profile()).await;

    let stats = result?;
    println!("{}", stats);
    Ok(())
}

fn run_sort_calibrate(config: &ArmConfig, color: CubeColor, roi: &std::path::Path) -> Result<()> {
    let path = config.sorting().calibration_file();
    let mut calibration = ColorCalibration::load_or_default(path)?;
    let samples = load_roi_samples(roi)?;
    let range = calibration
        .calibrate(color, &samples)
        .with_context(|| format!("calibrating {} from {}", color, roi.display()))?;
    calibration.save(path)?;
    info!(%color, %range, "Calibration saved");
    println!("{} calibrated: {}", color, range);
    Ok(())
}

async fn run_sort_test_moves(config: &ArmConfig, simulate: bool) -> Result<()> {
    let sorting = config.sorting();
    let detector = ScriptedDetector::default();
    let rig = Rig::start(config, sorting.joints(), simulate);
    let result = {
        let station = SortingStation::new(rig.actuator(), &detector, sorting, ColorCalibration::default());
        until_interrupted(station.test_moves(), ctrl_c()).await
    };
    rig.shutdown(sorting.home(), sorting.profile()).await;
    Ok(result.unwrap_or(Ok(()))?)
}
