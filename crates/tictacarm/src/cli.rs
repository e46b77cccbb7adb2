//! Command-line interface for tictacarm.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tictacarm::CubeColor;

/// tictacarm - servo arm that plays tic-tac-toe and sorts cubes
#[derive(Parser, Debug)]
#[command(name = "tictacarm")]
#[command(about = "Robot arm tic-tac-toe opponent and cube sorter", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the rig configuration file
    #[arg(short, long, global = true, default_value = "arm_config.toml")]
    pub config: PathBuf,

    /// Use the simulated arm and a still image instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Seed for the robot's random choices
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Subcommand to run; the interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive menu: calibrate, test positions, play
    Menu,

    /// Run the servo calibration sweep
    Calibrate,

    /// Visit every board cell and storage slot
    TestPositions,

    /// Play tic-tac-toe against the arm
    Play {
        /// Number of games; asks to play again when omitted
        #[arg(short, long)]
        games: Option<usize>,
    },

    /// Cube sorting station
    Sort {
        /// Sorting subcommand
        #[command(subcommand)]
        command: SortCommand,
    },
}

/// Cube sorting commands
#[derive(Subcommand, Debug)]
pub enum SortCommand {
    /// Sort cubes until Ctrl-C or the cycle limit
    Run {
        /// Stop after this many scans
        #[arg(long)]
        cycles: Option<usize>,
    },

    /// Fit a colour box from region-of-interest samples
    Calibrate {
        /// Colour to calibrate
        #[arg(long, value_enum)]
        color: CubeColor,

        /// JSON file of `[h, s, v]` samples taken from the cube
        #[arg(long)]
        roi: PathBuf,
    },

    /// Visit home, both bins and pickup, then exercise the claw
    TestMoves,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_menu() {
        let cli = Cli::try_parse_from(["tictacarm"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("arm_config.toml"));
        assert!(!cli.simulate);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tictacarm", "play", "--games", "2", "--simulate", "--seed", "7"])
                .unwrap();
        assert!(matches!(cli.command, Some(Command::Play { games: Some(2) })));
        assert!(cli.simulate);
        assert_eq!(cli.seed, Some(7));
    }

    #[test]
    fn test_sort_calibrate_parses_color() {
        let cli = Cli::try_parse_from([
            "tictacarm", "sort", "calibrate", "--color", "aqua", "--roi", "roi.json",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Sort {
                command: SortCommand::Calibrate { color, roi },
            }) => {
                assert_eq!(color, CubeColor::Aqua);
                assert_eq!(roi, PathBuf::from("roi.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
