//! assistant-chat - terminal front end for the assistant client
//!
//! Reads lines from stdin. Plain text is sent to the service; lines starting
//! with `/` are commands (`/help` lists them). Replies are rendered from the
//! dispatcher's event stream.

use assistant_client::status::{check_health, load_model_catalog, MODEL_LOAD_FAILED_NOTICE};
use assistant_client::{
    ConnectionStatus, DispatchEvent, Dispatcher, HealthMonitor, HttpTransport, IgnoreReason,
    LoggingTransport, SendOutcome, Settings, TransportMode,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_stream::{Stream, StreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WELCOME: &str = "Welcome to AI Assistant! Select a model and start chatting.";
const NEW_CHAT: &str = "New conversation started. How can I help you?";

const HELP: &str = "\
Commands:
  /new              start a new conversation
  /model [name]     show or switch the active model
  /models           list models offered by the service
  /health           check the service now
  /status           last status seen by the background check
  /stream on|off    streamed or whole replies
  /temp <0..1>      set the temperature
  /history          print the conversation
  /quit             exit";

type Transport = Arc<LoggingTransport<HttpTransport>>;

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Message(&'a str),
    NewChat,
    Model(Option<&'a str>),
    Models,
    Health,
    Status,
    Stream(Option<bool>),
    Temperature(&'a str),
    History,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Message(line);
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        match name {
            "new" => Command::NewChat,
            "model" => Command::Model(arg),
            "models" => Command::Models,
            "health" => Command::Health,
            "status" => Command::Status,
            "stream" => Command::Stream(match arg {
                Some("on") => Some(true),
                Some("off") => Some(false),
                _ => None,
            }),
            "temp" => Command::Temperature(arg.unwrap_or_default()),
            "history" => Command::History,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line),
        }
    }
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assistant_client=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(
        base_url = %settings.base_url,
        model = %settings.model,
        mode = %settings.mode,
        "Starting chat client"
    );

    let transport: Transport = Arc::new(LoggingTransport::new(HttpTransport::new(
        &settings.base_url,
        settings.request_timeout,
    )?));
    let dispatcher = Arc::new(Dispatcher::new(transport.clone(), &settings));

    let renderer = tokio::spawn(render(dispatcher.event_stream()));
    dispatcher.post_notice(WELCOME);
    println!("{HELP}");

    let catalog = load_model_catalog(transport.as_ref()).await;
    if let Some(model) = catalog.preferred() {
        dispatcher.set_active_model(model);
    }
    if catalog.error.is_some() {
        dispatcher.post_notice(MODEL_LOAD_FAILED_NOTICE);
    }

    let health = HealthMonitor::spawn(transport.clone(), settings.health_interval);
    let status_reporter = tokio::spawn(report_status(health.watch()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Message(text) => {
                let dispatcher = dispatcher.clone();
                let text = text.to_string();
                tokio::spawn(async move {
                    if dispatcher.send(&text).await == SendOutcome::Ignored(IgnoreReason::Busy) {
                        eprintln!("(still generating, message dropped)");
                    }
                });
            }
            Command::NewChat => {
                dispatcher.new_chat();
                dispatcher.post_notice(NEW_CHAT);
            }
            Command::Model(Some(name)) => dispatcher.switch_model(name),
            Command::Model(None) => println!("model: {}", dispatcher.session().active_model),
            Command::Models => {
                let catalog = load_model_catalog(transport.as_ref()).await;
                let active = dispatcher.session().active_model;
                for (model, label) in catalog.models.iter().zip(catalog.labels()) {
                    let marker = if model.name == active { "*" } else { " " };
                    println!("{marker} {label}");
                }
            }
            Command::Health => println!("{}", check_health(transport.as_ref()).await),
            Command::Status => println!("{}", health.current()),
            Command::Stream(Some(on)) => {
                let mode = if on {
                    TransportMode::Streaming
                } else {
                    TransportMode::Regular
                };
                dispatcher.set_mode(mode);
                println!("mode: {mode}");
            }
            Command::Stream(None) => println!("mode: {}", dispatcher.session().mode),
            Command::Temperature(raw) => match raw.parse::<f32>() {
                Ok(value) => match dispatcher.set_temperature(value) {
                    Ok(()) => println!("temperature: {value}"),
                    Err(e) => println!("{e}"),
                },
                Err(_) => println!("temperature: {}", dispatcher.session().temperature),
            },
            Command::History => {
                for message in dispatcher.history() {
                    println!(
                        "[{} {}] {}",
                        message.timestamp.format("%H:%M:%S"),
                        message.role.as_str(),
                        message.content
                    );
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Unknown(line) => println!("unknown command: {line} (try /help)"),
            Command::Quit => break,
        }
    }

    health.stop();
    status_reporter.abort();
    renderer.abort();
    Ok(())
}

/// Print dispatcher events as a running transcript
async fn render(events: impl Stream<Item = DispatchEvent>) {
    tokio::pin!(events);
    let mut shown = String::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event {
            DispatchEvent::UserAppended { .. } => {}
            DispatchEvent::PendingOpened { .. } => {
                shown.clear();
                print!("assistant> …");
            }
            DispatchEvent::DeltaApplied { content, .. } => {
                // Terminals can't rewrite earlier output, so print only what is new
                match content.strip_prefix(shown.as_str()) {
                    Some(suffix) if !shown.is_empty() => print!("{suffix}"),
                    _ => print!("\r\x1b[2Kassistant> {content}"),
                }
                shown = content;
            }
            DispatchEvent::Completed { .. } => {
                println!();
                shown.clear();
            }
            DispatchEvent::Failed { indicator, .. } => {
                if shown.is_empty() {
                    println!("\r\x1b[2Kassistant> {indicator}");
                } else {
                    println!("\n{indicator}");
                }
                shown.clear();
            }
            DispatchEvent::NoticePosted { message } => println!("[system] {}", message.content),
            DispatchEvent::ConversationReset => println!("----"),
        }
        let _ = stdout.flush();
    }
}

async fn report_status(mut rx: watch::Receiver<ConnectionStatus>) {
    while rx.changed().await.is_ok() {
        let status = *rx.borrow_and_update();
        eprintln!("[status] {status}");
    }
}
