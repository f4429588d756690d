use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use folio_sync::api::ApiClient;
use folio_sync::model::{ChatMessage, Comment};
use folio_sync::{Config, SyncHub};

#[derive(Parser, Debug)]
#[command(name = "folio-sync")]
#[command(about = "Developer CLI for the Folio sync layer")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/folio/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show a book's comment feed
  Comments {
    book_id: String,
    /// Keep the feed open and print it again on every change
    #[arg(short, long)]
    watch: bool,
  },
  /// Show a book's reviews
  Reviews { book_id: String },
  /// Show a profile's shelf (defaults to the configured profile)
  Shelf { profile_id: Option<String> },
  /// Show the configured profile's conversations
  Conversations,
  /// Show a conversation's messages
  Messages { conversation_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio_sync=info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let api = ApiClient::new(&config)?;
  let hub = SyncHub::new(api, &config);

  match args.command {
    Command::Comments { book_id, watch } => {
      if watch {
        watch_comments(&hub, &book_id).await
      } else {
        let read = hub.comments().for_book(&book_id).await?;
        print_freshness(read.served_stale());
        print_comments(&read.items);
        Ok(())
      }
    }
    Command::Reviews { book_id } => {
      let read = hub.reviews().for_book(&book_id).await?;
      print_freshness(read.served_stale());
      for review in read.items.iter() {
        println!(
          "[{}] {} rated {}/5: {}",
          review.posted_at.format("%Y-%m-%d"),
          review.reviewer,
          review.rating,
          review.body
        );
      }
      Ok(())
    }
    Command::Shelf { profile_id } => {
      let profile = profile_id.unwrap_or_else(|| config.profile.clone());
      let read = hub.shelves().for_profile(&profile).await?;
      print_freshness(read.served_stale());
      for entry in read.items.iter() {
        println!("{} by {} ({})", entry.title, entry.author, entry.shelf);
      }
      Ok(())
    }
    Command::Conversations => {
      let read = hub.chat().conversations(&config.profile).await?;
      print_freshness(read.served_stale());
      for convo in read.items.iter() {
        let badge = if convo.unread > 0 {
          format!(" [{} unread]", convo.unread)
        } else {
          String::new()
        };
        println!(
          "{}{} (last activity {})",
          convo.title,
          badge,
          convo.last_activity.format("%Y-%m-%d %H:%M")
        );
      }
      Ok(())
    }
    Command::Messages { conversation_id } => {
      let read = hub.chat().messages(&conversation_id).await?;
      print_freshness(read.served_stale());
      print_messages(&read.items);
      Ok(())
    }
  }
}

/// Subscribe to a feed and reprint it on every published change, nudging the
/// cache periodically so stale entries keep refreshing.
async fn watch_comments(hub: &SyncHub, book_id: &str) -> Result<()> {
  let mut handle = hub.comments().collection(book_id);
  let mut refresh = tokio::time::interval(std::time::Duration::from_secs(30));

  loop {
    tokio::select! {
      _ = refresh.tick() => {
        if let Err(err) = hub.comments().for_book(book_id).await {
          tracing::warn!(error = %err, "refresh failed, keeping last printed state");
        }
      }
      changed = handle.changed() => {
        if !changed {
          return Ok(());
        }
        let state = handle.state();
        if let Some(err) = state.error() {
          println!("error: {err}");
        } else if state.is_loading() {
          println!("loading...");
        } else if let Some(items) = state.items() {
          println!("--- {} comments ---", items.len());
          print_comments(items);
        }
      }
    }
  }
}

fn print_freshness(stale: bool) {
  if stale {
    println!("(cached data, refreshing in background)");
  }
}

fn print_comments(comments: &[Comment]) {
  for comment in comments {
    println!(
      "[{}] {}: {}",
      comment.posted_at.format("%Y-%m-%d %H:%M"),
      comment.author,
      comment.body
    );
    for tally in &comment.reactions {
      println!("    {} x{}", tally.emoji, tally.count());
    }
  }
}

fn print_messages(messages: &[ChatMessage]) {
  for message in messages {
    println!(
      "[{}] {}: {}",
      message.sent_at.format("%H:%M"),
      message.sender,
      message.body
    );
    for tally in &message.reactions {
      println!("    {} x{}", tally.emoji, tally.count());
    }
  }
}
