use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Config;
use crate::dialogue::DialogueConfig;
use crate::error::{ChatError, Result};
use crate::providers::Provider;

#[derive(Parser)]
#[command(name = "dialexa")]
#[command(version)]
#[command(about = "Ask, stream, solve and stage role-play debates against hosted chat models")]
pub struct Args {
    /// TOML config file (defaults to $DIALEXA_CONFIG when set)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Provider whose endpoint and API-key variable are used
    #[arg(long, value_enum, global = true)]
    pub provider: Option<Provider>,

    /// Override the chat-completions URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Log verbosity: -v info, -vv debug (RUST_LOG wins when set)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ask a single question and print the answer
    Ask {
        question: String,

        /// Model id (defaults to the config's ask_model)
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Stream answers; without a question, reads one question per stdin line
    Curio {
        question: Option<String>,

        #[arg(long, short)]
        model: Option<String>,

        /// Image URL (http or data:) sent with the first question to vision models
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Solve an equation written in LaTeX
    Math {
        equation: String,

        #[arg(long, short)]
        model: Option<String>,
    },

    /// Stage a role-play dialogue between two models
    Debate(DebateArgs),

    /// List the built-in model catalog
    Models,
}

#[derive(clap::Args, Default)]
pub struct DebateArgs {
    /// TOML file with [role_a], [role_b], scenario, opening, fallback_opening, rounds
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub role_a: Option<String>,
    #[arg(long)]
    pub description_a: Option<String>,
    #[arg(long)]
    pub model_a: Option<String>,

    #[arg(long)]
    pub role_b: Option<String>,
    #[arg(long)]
    pub description_b: Option<String>,
    #[arg(long)]
    pub model_b: Option<String>,

    /// Scenario shown first; "<role A> asks ..." in it becomes the opening line
    #[arg(long)]
    pub scenario: Option<String>,

    /// Explicit opening line for role A
    #[arg(long)]
    pub opening: Option<String>,

    /// Additional round pairs after the opening exchange
    #[arg(long)]
    pub rounds: Option<usize>,
}

impl DebateArgs {
    /// Start from `--file` (or the built-in physics debate) and apply flags.
    pub fn to_dialogue_config(&self, config: &Config) -> Result<DialogueConfig> {
        let mut dialogue = match &self.file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| ChatError::Config(format!("{}: {e}", path.display())))?;
                toml::from_str(&text).map_err(|e| ChatError::Config(e.to_string()))?
            }
            None => {
                let mut preset = DialogueConfig::physics_debate(&config.ask_model, &config.model);
                preset.rounds = config.rounds;
                preset
            }
        };

        let overlay = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                *slot = v.clone();
            }
        };
        overlay(&mut dialogue.role_a.name, &self.role_a);
        overlay(&mut dialogue.role_a.description, &self.description_a);
        overlay(&mut dialogue.role_a.model, &self.model_a);
        overlay(&mut dialogue.role_b.name, &self.role_b);
        overlay(&mut dialogue.role_b.description, &self.description_b);
        overlay(&mut dialogue.role_b.model, &self.model_b);

        if self.scenario.is_some() {
            dialogue.scenario = self.scenario.clone();
        }
        if self.opening.is_some() {
            dialogue.opening = self.opening.clone();
        }
        if let Some(rounds) = self.rounds {
            dialogue.rounds = rounds;
        }
        Ok(dialogue)
    }
}

/// Default `tracing` filter for a `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "dialexa=info,warn",
        _ => "dialexa=debug,info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_parse_ask() {
        let args = Args::parse_from(["dialexa", "ask", "what is rust?"]);
        match args.command {
            Command::Ask { question, model } => {
                assert_eq!(question, "what is rust?");
                assert!(model.is_none());
            }
            _ => panic!("expected ask"),
        }
        assert!(args.provider.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_parse_ask_with_model() {
        let args = Args::parse_from(["dialexa", "ask", "q", "--model", "google/gemma-3-4b-it:free"]);
        assert!(matches!(args.command, Command::Ask { model: Some(ref m), .. } if m == "google/gemma-3-4b-it:free"));
    }

    #[test]
    fn test_args_parse_global_flags_after_subcommand() {
        let args = Args::parse_from(["dialexa", "math", "x+1=2", "--provider", "openai", "-vv"]);
        assert_eq!(args.provider, Some(Provider::Openai));
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Command::Math { ref equation, .. } if equation == "x+1=2"));
    }

    #[test]
    fn test_args_parse_curio_without_question() {
        let args = Args::parse_from(["dialexa", "curio", "--image-url", "https://x/y.png"]);
        match args.command {
            Command::Curio { question, image_url, .. } => {
                assert!(question.is_none());
                assert_eq!(image_url.as_deref(), Some("https://x/y.png"));
            }
            _ => panic!("expected curio"),
        }
    }

    #[test]
    fn test_args_parse_debate_flags() {
        let args = Args::parse_from([
            "dialexa", "debate", "--role-a", "Chef", "--role-b", "Critic", "--rounds", "1",
            "--opening", "Taste this.",
        ]);
        let Command::Debate(debate) = args.command else { panic!("expected debate") };
        assert_eq!(debate.role_a.as_deref(), Some("Chef"));
        assert_eq!(debate.rounds, Some(1));
    }

    #[test]
    fn test_args_parse_models() {
        let args = Args::parse_from(["dialexa", "models"]);
        assert!(matches!(args.command, Command::Models));
    }

    #[test]
    fn test_args_config_path() {
        let args = Args::parse_from(["dialexa", "--config", "/tmp/d.toml", "models"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/d.toml")));
    }

    #[test]
    fn test_debate_defaults_to_physics_preset() {
        let config = Config { rounds: 2, ..Config::default() };
        let dialogue = DebateArgs::default().to_dialogue_config(&config).unwrap();
        assert_eq!(dialogue.role_a.name, "Theoretical Physicist");
        assert_eq!(dialogue.role_a.model, config.ask_model);
        assert_eq!(dialogue.role_b.model, config.model);
        assert_eq!(dialogue.rounds, 2);
    }

    #[test]
    fn test_debate_flags_override_preset() {
        let args = DebateArgs {
            role_b: Some("Critic".into()),
            model_b: Some("m-b".into()),
            scenario: Some("A kitchen.".into()),
            rounds: Some(0),
            ..DebateArgs::default()
        };
        let dialogue = args.to_dialogue_config(&Config::default()).unwrap();
        assert_eq!(dialogue.role_b.name, "Critic");
        assert_eq!(dialogue.role_b.model, "m-b");
        assert_eq!(dialogue.scenario.as_deref(), Some("A kitchen."));
        assert_eq!(dialogue.rounds, 0);
        assert_eq!(dialogue.role_a.name, "Theoretical Physicist");
    }

    #[test]
    fn test_debate_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
scenario = "The Chef asks whether the soup needs salt."
rounds = 1
[role_a]
name = "Chef"
description = "Cooks"
model = "m1"
[role_b]
name = "Critic"
description = "Tastes"
model = "m2"
"#
        )
        .unwrap();
        let args = DebateArgs { file: Some(file.path().to_path_buf()), ..DebateArgs::default() };
        let dialogue = args.to_dialogue_config(&Config::default()).unwrap();
        assert_eq!(dialogue.rounds, 1);
        assert_eq!(dialogue.resolve_opening().unwrap(), "whether the soup needs salt?");
    }

    #[test]
    fn test_debate_missing_file_is_config_error() {
        let args = DebateArgs { file: Some(PathBuf::from("/nonexistent/debate.toml")), ..DebateArgs::default() };
        assert!(matches!(args.to_dialogue_config(&Config::default()), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(0), "warn");
        assert!(log_filter(1).contains("info"));
        assert!(log_filter(5).contains("debug"));
    }
}
