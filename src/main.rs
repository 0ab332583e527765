//! Clinika - interactive terminal client for the medical assistant
//!
//! Plain lines are sent as chat messages; lines starting with `/` are
//! commands. The transcript goes to stdout, logs go to stderr.

use clinika_client::backend::{DocumentFile, HttpBackend, LoggingBackend, ACCEPTED_EXTENSIONS};
use clinika_client::config::ClientConfig;
use clinika_client::download::DirectoryDownloadSink;
use clinika_client::runtime::{self, Dispatch, SessionEvent, SessionHandle};
use clinika_client::session::{ChatMessage, Sender, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /upload <path>   upload a .pdf or .txt document
  /export          export the last assistant reply
  /patients        list known patients
  /switch <id>     switch to another patient
  /reset           clear the patient context
  /status          show the session status
  /quit            leave
Anything else is sent to the assistant.";

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Send(String),
    Upload(PathBuf),
    Export,
    Patients,
    Switch(String),
    Reset,
    Status,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, arg)| (name, arg.trim()));

    match name {
        "upload" if !arg.is_empty() => Command::Upload(PathBuf::from(arg)),
        "export" => Command::Export,
        "patients" => Command::Patients,
        "switch" => Command::Switch(arg.to_string()),
        "reset" => Command::Reset,
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.trim().to_string()),
    }
}

fn label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
        Sender::Placeholder => "…",
    }
}

fn print_message(message: &ChatMessage) {
    println!("[{}] {}", label(message.sender), message.content);
}

/// Mirror session events onto stdout until the session goes away
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::MessageInserted { message, .. } | SessionEvent::MessageReplaced { message, .. }) => {
                print_message(&message);
            }
            Ok(SessionEvent::ContextChanged { bound_record_id }) => match bound_record_id {
                Some(id) => println!("  (patient {id})"),
                None => println!("  (no patient selected)"),
            },
            Ok(SessionEvent::StatusChanged { status }) => tracing::debug!(%status, "Status changed"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Transcript printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_command(handle: &SessionHandle, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let dispatched = match command {
        Command::Send(text) => handle.send_message(text).await,
        Command::Upload(path) => {
            let file = match DocumentFile::from_path(&path).await {
                Ok(file) => file,
                Err(e) => {
                    println!("! Cannot read {}: {e}", path.display());
                    return Ok(());
                }
            };
            if !file.is_accepted_kind() {
                println!("! Only {} documents are accepted", ACCEPTED_EXTENSIONS.join(", "));
                return Ok(());
            }
            handle.upload_document(file).await
        }
        Command::Export => handle.export_last_reply().await,
        Command::Switch(id) => handle.switch_patient(id).await,
        Command::Reset => handle.reset_context().await,
        Command::Patients => {
            match handle.list_patients().await {
                Ok(patients) if patients.is_empty() => println!("  (no patients yet)"),
                Ok(patients) => {
                    for patient in patients {
                        let name = patient.name.as_deref().unwrap_or("unknown");
                        println!(
                            "  {} - {name} ({} documents)",
                            patient.id, patient.document_count
                        );
                    }
                }
                Err(e) => println!("! Cannot list patients: {e}"),
            }
            return Ok(());
        }
        Command::Status => {
            let snapshot = handle.snapshot().await?;
            println!(
                "  status: {} | patient: {} | {}",
                snapshot.status.as_deref().unwrap_or("-"),
                snapshot.bound_record_id.as_deref().unwrap_or("none"),
                if snapshot.is_busy() { "busy" } else { "idle" }
            );
            return Ok(());
        }
        Command::Help => {
            println!("{HELP}");
            return Ok(());
        }
        Command::Unknown(input) => {
            println!("! Unknown command {input}, try /help");
            return Ok(());
        }
        Command::Quit => return Ok(()),
    };

    match dispatched {
        Ok(Dispatch::Started { operation }) => tracing::debug!(%operation, "Dispatched"),
        Ok(Dispatch::Skipped) => {}
        Err(e) => println!("! {e}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinika_client=info,clinika=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(
        base_url = %config.api_base_url,
        download_dir = %config.download_dir.display(),
        timeout_secs = ?config.request_timeout.map(|t| t.as_secs()),
        "Starting Clinika client"
    );

    let backend = HttpBackend::new(config.api_base_url.clone(), config.request_timeout)?;
    let backend = Arc::new(LoggingBackend::new(backend));
    let downloads = Arc::new(DirectoryDownloadSink::new(config.download_dir.clone()));

    let session = match &config.greeting {
        Some(greeting) => Session::with_greeting(greeting.clone()),
        None => Session::new(),
    };
    for message in session.log().all() {
        print_message(message);
    }

    let handle = runtime::start(session, backend, downloads);
    let printer = tokio::spawn(print_events(handle.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = parse_command(&line);
        if command == Command::Quit {
            break;
        }
        run_command(&handle, command).await?;
    }

    drop(handle);
    printer.abort();
    Ok(())
}
