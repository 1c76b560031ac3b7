mod cli;
mod config;
mod models;
mod providers;
mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cli::{CliArgs, Command};
use config::AppConfig;
use models::{FrameMessage, FrameMessageType, UploadedFile};
use providers::RelayBackend;
use services::location::{init_map, StaticGeolocator};
use services::{
    AssistantGateway, AttachmentEncoder, Database, QuoteFlow, QuoteSession, SessionResolver,
    TranscriptStore,
};

const ATTACH_COMMAND: &str = "/attach ";
const TRANSCRIPT_COMMAND: &str = "/transcript";
const ATTACHMENTS_COMMAND: &str = "/attachments";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    match args.command {
        Command::Quote {
            email,
            member,
            assistant_url,
            assistant_key,
            timeout_secs,
        } => {
            let config = AppConfig::new(assistant_url, assistant_key, args.db_path, timeout_secs)?;
            run_quote(config, &email, member.as_deref()).await
        }
        Command::Map { lat, lng, maps_key } => run_map(lat, lng, maps_key.as_deref().unwrap_or_default()).await,
    }
}

async fn run_quote(config: AppConfig, email: &str, member: Option<&str>) -> Result<()> {
    let db = Database::open(&config.db_path).await?;
    let backend = RelayBackend::new(
        &config.assistant_url,
        config.assistant_key.clone(),
        config.request_timeout,
    )?;
    let gateway = AssistantGateway::new(Arc::new(backend));

    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<FrameMessage>();
    let printer = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            render_frame(&frame);
        }
    });

    let transcripts = TranscriptStore::new(db.clone());
    let flow = QuoteFlow::new(
        SessionResolver::new(db.clone(), gateway.clone()),
        gateway.clone(),
        AttachmentEncoder::new(db.clone(), gateway),
        transcripts.clone(),
        frames_tx,
    );
    let session = QuoteSession::new(member);
    if session.user_key.is_guest() {
        tracing::info!("Chatting as guest {}", session.user_key);
    }

    let Some(record) = flow.request_quote(&session, email).await? else {
        anyhow::bail!("An email address is required to request a quote");
    };

    let mut pending: Vec<UploadedFile> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if let Some(path) = line.strip_prefix(ATTACH_COMMAND) {
            let file = UploadedFile::from_path(path.trim());
            eprintln!("Queued {} for the next message", file.filename);
            pending.push(file);
            continue;
        }

        match line.trim() {
            TRANSCRIPT_COMMAND => {
                match transcripts.transcript(&record.id).await {
                    Ok(text) => eprintln!("{}", text),
                    Err(e) => tracing::error!("Failed to load transcript: {:#}", e),
                }
                continue;
            }
            ATTACHMENTS_COMMAND => {
                match db.list_attachments(&record.id).await {
                    Ok(atts) => {
                        for att in atts {
                            eprintln!("{} ({})", att.filename, att.file_id);
                        }
                    }
                    Err(e) => tracing::error!("Failed to list attachments: {:#}", e),
                }
                continue;
            }
            _ => {}
        }

        submit_prompt(&flow, &session, email, &line, &mut pending).await;
        tracing::debug!("Quote flow back to {:?}", flow.state());
    }

    drop(flow);
    printer.await?;

    if let Some(saved) = db.get_conversation(&record.id).await? {
        eprintln!(
            "Conversation {} saved with {} attachment(s)",
            saved.id,
            saved.attachments.len()
        );
    }
    Ok(())
}

/// Send one prompt. A failed exchange is logged and the chat keeps going;
/// queued uploads are only dropped once a message went through.
async fn submit_prompt(
    flow: &QuoteFlow,
    session: &QuoteSession,
    email: &str,
    line: &str,
    pending: &mut Vec<UploadedFile>,
) -> bool {
    match flow.send_message(session, email, line, pending).await {
        Ok(Some(_)) => {
            pending.clear();
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::error!("Message not delivered: {:#}", e);
            false
        }
    }
}

async fn run_map(lat: f64, lng: f64, maps_key: &str) -> Result<()> {
    let locator = StaticGeolocator::new(lat, lng);
    let mut rendered = None;
    init_map(Some(&locator), maps_key, |view| rendered = Some(view)).await;

    match rendered {
        Some(view) => {
            if view.has_api_key() {
                eprintln!("Maps key: configured (not printed)");
            } else {
                tracing::warn!("No maps key configured; the view cannot be rendered by the provider");
                eprintln!("Maps key: missing");
            }
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        None => eprintln!("Map unavailable"),
    }
    Ok(())
}

fn render_frame(frame: &FrameMessage) {
    match frame.kind {
        FrameMessageType::UserMessage => println!("You: {}", frame.message),
        FrameMessageType::ShowWaiting => eprintln!("..."),
        FrameMessageType::HideWaiting => {}
        FrameMessageType::BotMessage => println!("Assistant: {}", frame.message),
    }
}
