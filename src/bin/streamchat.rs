//! Interactive terminal chat over a streaming chat endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! STREAMCHAT_API_KEY=sk-... streamchat
//!
//! # Specify a model and endpoint
//! streamchat --model gpt-4 --endpoint http://localhost:8000/api/chat
//!
//! # Upstream framed as server-sent events
//! streamchat --framing event-stream
//!
//! # Disable colors (useful for piping output)
//! streamchat --no-color
//!
//! # Log requests and stream errors to stderr
//! streamchat --verbose
//! ```
//!
//! The API key is never taken from the command line; set `STREAMCHAT_API_KEY`
//! or use `/key` once running. Type `/help` for the other commands.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use streamchat::commands::{ChatCommand, help_text, parse_command};
use streamchat::config::{API_KEY_ENV, DEFAULT_DEVELOPER_MESSAGE};
use streamchat::{
    ChatArgs, ChatClient, ChatConfig, KnownModel, Model, PlainTextRenderer, Renderer,
    SessionController, SessionSettings, StderrLogger, TerminalPresenter,
};

/// Main entry point for the streamchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("streamchat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    let use_color = config.use_color;
    streamchat::register_biometrics(biometrics::Collector::new());

    let mut client = ChatClient::new(&config)?;
    if config.verbose {
        client = client.with_logger(Arc::new(StderrLogger));
    }
    let mut settings = SessionSettings::from_config(&config);
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        settings = settings.with_credential(key);
    }
    let session = SessionController::new(client, settings)
        .with_framing(config.framing)
        .with_observer(TerminalPresenter::new(PlainTextRenderer::with_color(
            use_color,
        )));
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Stream Chat (model: {})", session.snapshot().model);
    println!("Type /help for commands, /quit to exit");
    renderer.print_info(session.snapshot().input_hint());
    println!();

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let command = parse_command(line);
                if !matches!(command, Some(ChatCommand::Key(_))) {
                    let _ = rl.add_history_entry(line);
                }

                if let Some(cmd) = command {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            if session.clear_transcript() {
                                renderer.print_info("Conversation cleared.");
                            } else {
                                renderer.print_error("Cannot clear while a reply is streaming.");
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Model(model_name) => {
                            let model = model_name
                                .parse()
                                .unwrap_or_else(|_| Model::Custom(model_name.clone()));
                            session.set_model(model);
                            renderer.print_info(&format!("Model changed to: {}", model_name));
                        }
                        ChatCommand::Models => print_models(&session.snapshot().model),
                        ChatCommand::System(message) => match message {
                            Some(message) => {
                                renderer
                                    .print_info(&format!("Developer message set to: {}", message));
                                session.set_developer_message(message);
                            }
                            None => {
                                session.set_developer_message(DEFAULT_DEVELOPER_MESSAGE);
                                renderer.print_info("Developer message restored to the default.");
                            }
                        },
                        ChatCommand::Key(key) => {
                            session.set_credential(key);
                            renderer.print_info("API key set. Use /validate to check it.");
                        }
                        ChatCommand::Validate => {
                            renderer.print_info("Checking API key...");
                            let status = session.validate_credential().await;
                            renderer.print_info(&format!("API key is {status}."));
                        }
                        ChatCommand::Status => print_status(&session),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                let snapshot = session.snapshot();
                if !snapshot.can_send(line) {
                    renderer.print_error(snapshot.input_hint());
                    continue;
                }
                println!("Assistant:");
                // Turn failures are printed by the presenter from the snapshot.
                if let Err(e) = session.send_message(line).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_models(current: &Model) {
    println!("    Known models:");
    for model in KnownModel::ALL {
        let marker = if Model::Known(model) == *current {
            "*"
        } else {
            " "
        };
        println!("    {} {:<16} {}", marker, model.id(), model.display_name());
    }
}

fn print_status(session: &SessionController<ChatClient>) {
    let snapshot = session.snapshot();
    let settings = session.settings();
    println!("    Session Status:");
    println!("      Model: {}", snapshot.model);
    println!("      Messages: {}", snapshot.messages.len());
    println!(
        "      API key: {}",
        if snapshot.has_credential {
            snapshot.validation.to_string()
        } else {
            "not set".to_string()
        }
    );
    println!("      Developer message: {}", settings.developer_message);
    if let Some(error) = snapshot.error.as_deref() {
        println!("      Last error: {}", error);
    }
    println!("      {}", snapshot.input_hint());
}
