use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dialexa::cli::{log_filter, Args, Command, DebateArgs};
use dialexa::config::Config;
use dialexa::dialogue::{ConversationTurn, DialogueSession, DialogueStatus, RemoteResponder};
use dialexa::modes::{self, CurioSession};
use dialexa::providers::MODELS;
use dialexa::{render, ChatClient, ChatError, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(args, &cancel).await {
        Ok(code) => code,
        Err(e) => {
            render::print_error(&e);
            match e {
                ChatError::Cancelled => ExitCode::from(130),
                e if e.is_precondition() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args, cancel: &CancellationToken) -> Result<ExitCode> {
    if let Command::Models = args.command {
        render::print_models(MODELS);
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load(args.config.as_deref(), args.provider)?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }
    info!(?config, "configuration loaded");

    match args.command {
        Command::Ask { question, model } => {
            let client = ChatClient::from_config(&config)?;
            let model = model.unwrap_or_else(|| config.ask_model.clone());
            render::print_header("ASK ANYTHING", &model);
            let answer = modes::ask(&client, &model, &question, cancel).await?;
            println!("{answer}");
            render::print_footer();
        }
        Command::Math { equation, model } => {
            let client = ChatClient::from_config(&config)?;
            let model = model.unwrap_or_else(|| config.model.clone());
            render::print_header("MATH SOLVER", &model);
            let solution = modes::solve_equation(&client, &model, &equation, cancel).await?;
            println!("{solution}");
            render::print_footer();
        }
        Command::Curio { question, model, image_url } => {
            let client = ChatClient::from_config(&config)?;
            let mut session = CurioSession::new(model.unwrap_or_else(|| config.model.clone()));
            render::print_header("CURIO", session.model());
            match question {
                Some(q) => curio_once(&mut session, &client, &q, image_url.as_deref(), cancel).await?,
                None => curio_repl(&mut session, &client, image_url, cancel).await?,
            }
        }
        Command::Debate(debate) => return run_debate(&debate, &config, cancel).await,
        Command::Models => unreachable!("handled above"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn curio_once(
    session: &mut CurioSession,
    client: &ChatClient,
    question: &str,
    image_url: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    session.ask(client, question, image_url, cancel, render::print_fragment).await?;
    render::print_footer();
    Ok(())
}

async fn curio_repl(
    session: &mut CurioSession,
    client: &ChatClient,
    mut image_url: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", ">".bright_green().bold());
        let _ = std::io::stderr().flush();

        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            line = lines.next_line() => Some(line),
        };
        let Some(line) = line else { break };
        let Some(line) = line? else { break };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        // Failures are shown and the prompt comes back.
        match curio_once(session, client, question, image_url.take().as_deref(), cancel).await {
            Ok(()) => {}
            Err(ChatError::Cancelled) => break,
            Err(e) => render::print_error(&e),
        }
    }
    info!(exchanges = session.history().len(), "curio session ended");
    Ok(())
}

async fn run_debate(debate: &DebateArgs, config: &Config, cancel: &CancellationToken) -> Result<ExitCode> {
    let dialogue = debate.to_dialogue_config(config)?;
    let client = ChatClient::from_config(config)?;

    println!("{}", "ROLE PLAY SIMULATOR".bright_cyan().bold());
    println!("{}: {} ({})", "Role A".bright_yellow(), dialogue.role_a.name, dialogue.role_a.model);
    println!("{}: {} ({})", "Role B".bright_yellow(), dialogue.role_b.name, dialogue.role_b.model);
    println!("{}: {}", "Rounds".bright_yellow(), dialogue.rounds);
    println!("{}", "=".repeat(50).bright_blue());

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_transcript(rx, dialogue.role_a.name.clone()));

    let mut session = DialogueSession::with_observer(tx);
    let status = session.run(&dialogue, &RemoteResponder::new(client), cancel).await;
    let turns = session.transcript().len();
    drop(session);
    let _ = printer.await;

    let code = match status? {
        DialogueStatus::Failed(msg) => {
            eprintln!(
                "{} An error occurred during the conversation: {}",
                "[error]".bright_red().bold(),
                msg
            );
            ExitCode::FAILURE
        }
        DialogueStatus::Cancelled => {
            eprintln!("{} stopped after {} turns", "[cancelled]".bright_yellow().bold(), turns);
            ExitCode::from(130)
        }
        _ => {
            render::print_footer();
            println!("Complete! {turns} turns.");
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

/// Print each newly appended turn as snapshots arrive.
async fn print_transcript(mut rx: mpsc::UnboundedReceiver<Vec<ConversationTurn>>, role_a: String) {
    let mut shown = 0;
    while let Some(snapshot) = rx.recv().await {
        if snapshot.len() < shown {
            shown = 0;
        }
        for turn in &snapshot[shown..] {
            render::print_turn(turn, &role_a);
        }
        shown = snapshot.len();
    }
}
