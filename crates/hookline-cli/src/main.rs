mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hookline_core::config::{default_config_dir, CoreConfig};
use hookline_core::{AgentType, HooklineContext};

/// Hookline - run coding-agent CLIs and broker their permission prompts.
#[derive(Parser, Debug)]
#[command(name = "hookline", version, about)]
struct Cli {
    /// Config directory (defaults to ~/.config/hookline)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check which agent CLIs are installed
    Probe {
        /// Only probe this agent
        #[arg(long)]
        agent: Option<AgentType>,
    },

    /// Run one prompt through an agent CLI and print the result
    Run {
        #[arg(long, default_value = "claude")]
        agent: AgentType,

        /// Workspace to run in
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Resume this session id
        #[arg(long, conflicts_with_all = ["fork", "fork_name"])]
        resume: Option<String>,

        /// Resume the most recent session
        #[arg(long, conflicts_with_all = ["resume", "fork", "fork_name"])]
        latest: bool,

        /// Fork this session id
        #[arg(long, conflicts_with = "fork_name")]
        fork: Option<String>,

        /// Fork the session with this name
        #[arg(long)]
        fork_name: Option<String>,

        /// Print stdout as it arrives
        #[arg(long)]
        stream: bool,

        /// Prompt text
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },

    /// Answer one Claude hook callback (JSON on stdin, JSON on stdout)
    Hook,

    /// Detect prompts and events in captured terminal output
    Scan {
        #[arg(long, default_value = "claude")]
        agent: AgentType,

        /// File to read (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Policy subcommands
    Policy {
        #[command(subcommand)]
        action: PolicyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommands {
    /// Evaluate one tool call against the workspace policy
    Check {
        /// Tool name (Bash, Read, shell, ...)
        #[arg(long)]
        tool: String,

        /// Shell command, for shell tools
        #[arg(long)]
        command: Option<String>,

        /// Workspace path
        #[arg(long)]
        cwd: Option<String>,
    },

    /// Print the effective policy for a project as JSON
    Show {
        /// Project name (last component of the workspace path)
        project: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(default_config_dir);
    let config = match CoreConfig::load(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_dir.display());
            return ExitCode::FAILURE;
        }
    };
    let ctx = HooklineContext::builder()
        .config_dir(&config_dir)
        .config(config)
        .default_agents()
        .build();

    let result = match cli.command {
        Commands::Probe { agent } => commands::probe(&ctx, agent).await,
        Commands::Run {
            agent,
            cwd,
            resume,
            latest,
            fork,
            fork_name,
            stream,
            prompt,
        } => {
            let op = commands::operation(prompt.join(" "), resume, latest, fork, fork_name);
            commands::run(&ctx, agent, op, cwd.as_deref(), stream).await
        }
        Commands::Hook => commands::hook(&ctx).await,
        Commands::Scan { agent, file } => commands::scan(&ctx, agent, file.as_deref()).await,
        Commands::Policy { action } => match action {
            PolicyCommands::Check { tool, command, cwd } => {
                commands::policy_check(&ctx, &tool, command.as_deref(), cwd.as_deref())
            }
            PolicyCommands::Show { project } => commands::policy_show(&ctx, &project),
        },
    };

    ctx.shutdown();
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn session_flags_are_mutually_exclusive() {
        let conflicts: [&[&str]; 4] = [
            &["--latest", "--fork", "abc"],
            &["--latest", "--fork-name", "nightly"],
            &["--resume", "abc", "--fork-name", "nightly"],
            &["--fork", "abc", "--fork-name", "nightly"],
        ];
        for flags in conflicts {
            let args = ["hookline", "run"].into_iter().chain(flags.iter().copied()).chain(["hi"]);
            let err = Cli::try_parse_from(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict, "{flags:?}");
        }
    }

    #[test]
    fn fork_name_parses() {
        let cli = Cli::try_parse_from(["hookline", "run", "--fork-name", "nightly", "go", "on"]).unwrap();
        match cli.command {
            Commands::Run { fork_name, prompt, .. } => {
                assert_eq!(fork_name.as_deref(), Some("nightly"));
                assert_eq!(prompt, vec!["go", "on"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
