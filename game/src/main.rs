use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learn_game::config::AppConfig;
use learn_game::human::TerminalAdapter;
use learn_game::players::{ComputerPlayer, Mark};
use learn_game::policy_table::policy_file_name;
use learn_game::{play_interactive, Game};
use log::info;
use std::path::PathBuf;

/// Teach two agents tic-tac-toe by self-play, then play the result.
#[derive(Parser)]
#[command(name = "tictactoe", version)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, global = true, default_value = "tictactoe.toml")]
    config: PathBuf,

    /// Directory holding the policy files (overrides the config)
    #[arg(long, global = true)]
    policy_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Train both agents and save their policies
    Train {
        /// Override number of training episodes
        #[arg(long)]
        episodes: Option<usize>,
        /// Seed the agents for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Play one game against a saved policy
    Play {
        /// Your name, as shown in prompts
        #[arg(long, default_value = "Human")]
        name: String,
        /// Take X and move first
        #[arg(long)]
        first: bool,
    },
}

fn train(config: &AppConfig) -> Result<()> {
    let p1 = ComputerPlayer::new("p1", Mark::Cross, config.agent);
    let p2 = ComputerPlayer::new("p2", Mark::Nought, config.agent);
    let (p1, p2) = match config.training.seed {
        Some(seed) => (p1.with_seed(seed), p2.with_seed(seed.wrapping_add(1))),
        None => (p1, p2),
    };
    let mut game = Game::new(Box::new(p1), Box::new(p2))?
        .with_progress_interval(config.training.progress_interval);
    info!("training for {} episodes", config.training.episodes);
    game.train(config.training.episodes)?;
    for path in game.policies_to_disk(&config.policy.dir, config.policy.export_json)? {
        println!("Policy saved to {}", path.display());
    }
    Ok(())
}

fn play(config: &AppConfig, name: &str, human_first: bool) -> Result<()> {
    let (agent_name, mark) = if human_first {
        ("p2", Mark::Nought)
    } else {
        ("p1", Mark::Cross)
    };
    let path = config.policy.dir.join(policy_file_name(agent_name));
    let agent = ComputerPlayer::from_disk(&path, "Computer", mark, config.agent.greedy())
        .with_context(|| format!("loading policy from {} (run `train` first)", path.display()))?;
    let report = play_interactive(agent, name, TerminalAdapter::stdio())?;
    info!("game over after {} moves: {:?}", report.moves, report.outcome);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(dir) = cli.policy_dir {
        config.policy.dir = dir;
    }

    match cli.command {
        Some(Command::Train { episodes, seed }) => {
            if let Some(episodes) = episodes {
                config.training.episodes = episodes;
            }
            config.training.seed = seed.or(config.training.seed);
            config.validate()?;
            train(&config)
        }
        Some(Command::Play { name, first }) => play(&config, &name, first),
        None => {
            println!("Training:");
            train(&config)?;
            println!("...done.");
            play(&config, "Human", false)
        }
    }
}
