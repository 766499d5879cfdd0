#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI driving a mail session against a mailbox snapshot

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mail_ui_core::{
    ChangeEvent, CoreConfig, MailSession, MemoryBackend, MessageSummary, Uid, format_received,
    recipient_line,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-cli")]
#[command(about = "Browse a mailbox snapshot through the mail UI core")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List accounts, default account first
    Accounts,

    /// List every account's folders
    Folders,

    /// List messages of a folder, newest first
    List {
        /// Account id (defaults to the default account)
        #[arg(long)]
        account: Option<String>,

        /// Folder to list from
        #[arg(long, default_value = "INBOX")]
        folder: String,

        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: usize,
    },

    /// Show a single message by UID
    Show {
        /// Message UID
        uid: u32,

        /// Account id (defaults to the default account)
        #[arg(long)]
        account: Option<String>,

        /// Folder containing the message
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },

    /// Fetch the first page of a folder, then check it for new messages
    Newer {
        /// Account id (defaults to the default account)
        #[arg(long)]
        account: Option<String>,

        /// Folder to check
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },
}

/// A session with its event stream and the backend it runs against.
struct Client {
    session: MailSession,
    events: broadcast::Receiver<ChangeEvent>,
    backend: Arc<MemoryBackend>,
}

impl Client {
    fn open(config: &CoreConfig) -> anyhow::Result<Self> {
        let path = config
            .snapshot
            .as_ref()
            .context("MAIL_SNAPSHOT must point at a mailbox snapshot")?;
        let backend = Arc::new(MemoryBackend::from_path(path)?);
        let session = MailSession::new(backend.clone(), config);
        let events = session.subscribe();
        Ok(Self {
            session,
            events,
            backend,
        })
    }

    /// Process everything in flight and fail on the first reported error.
    async fn settle(&mut self) -> anyhow::Result<()> {
        self.session.run_until_idle().await;
        while let Ok(event) = self.events.try_recv() {
            if let ChangeEvent::Error { operation, message } = event {
                bail!("{operation}: {message}");
            }
        }
        Ok(())
    }

    async fn load_directory(&mut self) -> anyhow::Result<()> {
        self.session.refresh_accounts();
        self.session.sync_folders();
        self.settle().await
    }

    fn account_id(&self, account: Option<&str>) -> anyhow::Result<String> {
        if let Some(id) = account {
            return Ok(id.to_string());
        }
        self.session
            .directory()
            .default_account()
            .map(|a| a.id.clone())
            .context("No accounts configured")
    }

    async fn open_folder(&mut self, account: Option<&str>, folder: &str) -> anyhow::Result<()> {
        self.load_directory().await?;
        let account = self.account_id(account)?;
        self.session.select_folder(&account, folder)?;
        self.settle().await
    }

    fn messages(&self) -> Vec<&MessageSummary> {
        self.session
            .active_window()
            .map(|w| w.messages().iter().collect())
            .unwrap_or_default()
    }

    fn active_is_outgoing(&self) -> bool {
        self.session
            .active()
            .and_then(|key| self.session.directory().folder(&key.account, &key.folder))
            .is_some_and(|f| f.role().is_outgoing())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = CoreConfig::from_env()?;
    let mut client = Client::open(&config)?;

    match &args.command {
        Command::Accounts => cmd_accounts(&mut client, &args).await?,
        Command::Folders => cmd_folders(&mut client, &args).await?,
        Command::List {
            account,
            folder,
            pages,
        } => cmd_list(&mut client, &args, account.as_deref(), folder, *pages).await?,
        Command::Show {
            uid,
            account,
            folder,
        } => cmd_show(&mut client, &args, account.as_deref(), folder, Uid(*uid)).await?,
        Command::Newer { account, folder } => {
            cmd_newer(&mut client, &args, account.as_deref(), folder).await?;
        }
    }

    Ok(())
}

async fn cmd_accounts(client: &mut Client, args: &Args) -> anyhow::Result<()> {
    client.load_directory().await?;
    let accounts = client.session.directory().accounts_ordered_for_display();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
    } else {
        for account in &accounts {
            println!(
                "{:<16} {:<24} {:<30} {:>4}{}",
                account.id,
                truncate(account.title(), 22),
                account.email_address,
                account.inbox_unread,
                if account.is_default { "  (default)" } else { "" },
            );
        }
    }

    Ok(())
}

async fn cmd_folders(client: &mut Client, args: &Args) -> anyhow::Result<()> {
    client.load_directory().await?;
    let accounts = client.session.directory().accounts_ordered_for_display();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
    } else {
        for account in &accounts {
            println!("{}", account.title());
            for folder in account.folders.values() {
                println!(
                    "  {:<40} {:>5} unread {:>6} total",
                    folder.title(),
                    folder.unread_count,
                    folder.message_count
                );
            }
        }
    }

    Ok(())
}

async fn cmd_list(
    client: &mut Client,
    args: &Args,
    account: Option<&str>,
    folder: &str,
    pages: usize,
) -> anyhow::Result<()> {
    client.open_folder(account, folder).await?;
    for _ in 1..pages {
        if client.session.request_older()?.is_none() {
            break;
        }
        client.settle().await?;
    }

    print_messages(client, args)
}

async fn cmd_newer(
    client: &mut Client,
    args: &Args,
    account: Option<&str>,
    folder: &str,
) -> anyhow::Result<()> {
    client.open_folder(account, folder).await?;
    client.session.request_newer()?;
    client.settle().await?;

    print_messages(client, args)
}

async fn cmd_show(
    client: &mut Client,
    args: &Args,
    account: Option<&str>,
    folder: &str,
    uid: Uid,
) -> anyhow::Result<()> {
    client.open_folder(account, folder).await?;
    client.session.open_message(uid)?;
    client.settle().await?;

    let view = client
        .session
        .message_view()
        .with_context(|| format!("Message {uid} could not be opened"))?;
    let bodies: Vec<String> = view
        .parts
        .bodies
        .iter()
        .filter_map(|body| client.backend.body_text(&body.uri))
        .collect();

    if args.json {
        let json = serde_json::json!({
            "uid": view.uid,
            "headers": view.tree.headers(),
            "parts": view.parts,
            "bodies": bodies,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("UID:     {}", view.uid);
    if let Some(headers) = view.tree.headers() {
        println!("Subject: {}", headers.subject);
        println!("From:    {}", mail_ui_core::format_mailboxes(&headers.from));
        println!("To:      {}", mail_ui_core::format_mailboxes(&headers.to));
        if !headers.cc.is_empty() {
            println!("CC:      {}", mail_ui_core::format_mailboxes(&headers.cc));
        }
    }

    println!("\n--- Body ---\n");
    for body in &bodies {
        println!("{body}");
    }

    if !view.parts.attachments.is_empty() {
        println!("\n--- Attachments ---");
        for attachment in &view.parts.attachments {
            println!("  {} ({})", attachment.label(), attachment.media_type);
        }
    }

    Ok(())
}

fn print_messages(client: &Client, args: &Args) -> anyhow::Result<()> {
    let messages = client.messages();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_message_table(&messages, client.active_is_outgoing());
    }
    Ok(())
}

fn print_message_table(messages: &[&MessageSummary], outgoing: bool) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    let now = chrono::Local::now();
    let header = format!("{:<8} {:<20} {:<30} {}", "UID", "Date", "From", "Subject");
    println!("{header}");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<8} {:<20} {:<30} {}{}",
            message.uid,
            format_received(message.received, &now),
            truncate(&recipient_line(message, outgoing), 28),
            if message.unread { "* " } else { "" },
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
