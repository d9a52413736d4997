//! Subcommands. Each one drives a single repository, aggregator,
//! synchronizer, or interpreter operation and prints its result.

use anyhow::{Context as _, anyhow, ensure};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use dreamer_core::{
  association::{EmotionalValence, NewAssociation},
  document::Row,
  dream::{DreamListOptions, DreamPatch, NewDream},
  element::{Element, ElementKind, ElementListOptions, ElementPatch, ElementSource},
  hypothesis::Feedback,
  integration::Integration,
  interpret::{Interpreter, TemplateGenerator},
  lifecycle::DreamStatus,
  paths,
  repo::Repository,
  session::SessionAggregator,
  sync::StatusSynchronizer,
  timestamp,
};
use dreamer_store_sqlite::SqliteStore;

pub struct App {
  pub repo:             Repository<SqliteStore>,
  pub uid:              String,
  pub hypothesis_count: usize,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
  timestamp::parse(s).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Subcommand)]
pub enum Command {
  /// Record a new dream.
  New {
    /// The dream narrative.
    text:         String,
    #[arg(long)]
    mood:         Option<String>,
    /// What was going on in waking life.
    #[arg(long = "context")]
    life_context: Option<String>,
    /// When the dream happened (RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    dreamed_at:   Option<DateTime<Utc>>,
  },

  /// List dreams, most recently dreamed first.
  List {
    #[arg(long)]
    status: Option<DreamStatus>,
    #[arg(long)]
    limit:  Option<usize>,
  },

  /// Show a dream with everything recorded under it.
  Show { dream_id: String },

  /// Change fields of a dream.
  Edit {
    dream_id:     String,
    #[arg(long)]
    text:         Option<String>,
    #[arg(long)]
    mood:         Option<String>,
    #[arg(long = "context")]
    life_context: Option<String>,
    #[arg(long, value_parser = parse_timestamp)]
    dreamed_at:   Option<DateTime<Utc>>,
    /// Set the status explicitly instead of deriving it.
    #[arg(long)]
    status:       Option<DreamStatus>,
  },

  /// Manage the elements of a dream.
  #[command(subcommand)]
  Element(ElementCommand),

  /// Attach a personal association to an element.
  Associate {
    dream_id:   String,
    element_id: String,
    text:       String,
    #[arg(long)]
    valence:    EmotionalValence,
    /// 1 to 5; out-of-range values are clamped.
    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    salience:   f64,
  },

  /// Generate hypotheses for a dream.
  Interpret { dream_id: String },

  /// Respond to a hypothesis; omit the response to clear it.
  Feedback {
    dream_id:      String,
    hypothesis_id: String,
    response:      Option<Feedback>,
  },

  /// Record the integration step for a dream.
  Integrate {
    dream_id:  String,
    /// One or two reflective questions.
    #[arg(long = "question", required = true)]
    questions: Vec<String>,
    #[arg(long)]
    practice:  String,
  },

  /// Write the integration journal entry.
  Journal { dream_id: String, text: String },

  /// Recompute a dream's status from its artifacts.
  Sync { dream_id: String },

  /// Delete a dream and everything under it.
  Delete { dream_id: String },

  /// Print live snapshots of a dream session, or of the dream list, until
  /// interrupted.
  Watch { dream_id: Option<String> },

  /// Show the current user profile.
  Profile,

  /// Record acceptance of the disclaimer.
  AcceptDisclaimer,
}

#[derive(Subcommand)]
pub enum ElementCommand {
  /// Add an element.
  Add {
    dream_id: String,
    #[arg(long)]
    kind:     ElementKind,
    #[arg(long)]
    label:    String,
    /// Ordering hint within the kind.
    #[arg(long)]
    order:    Option<i64>,
    /// Quote from the dream text; repeatable.
    #[arg(long)]
    evidence: Vec<String>,
  },

  /// Change fields of an existing element. Omitted fields are left as they
  /// are, and a hidden element stays hidden.
  Edit {
    dream_id:   String,
    element_id: String,
    #[arg(long)]
    kind:       Option<ElementKind>,
    #[arg(long)]
    label:      Option<String>,
    #[arg(long)]
    order:      Option<i64>,
    /// Replaces the stored evidence when given; repeatable.
    #[arg(long)]
    evidence:   Vec<String>,
  },

  /// Hide an element. It stays stored and can still be listed with `--all`.
  Rm { dream_id: String, element_id: String },

  /// List the elements of a dream.
  List {
    dream_id: String,
    /// Include hidden elements.
    #[arg(long)]
    all:      bool,
  },
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Print a live snapshot. Subscriber callbacks cannot fail, so rendering
/// errors are only logged.
fn emit_live<T: Serialize>(value: &T) {
  match serde_json::to_string_pretty(value) {
    Ok(s) => println!("{s}"),
    Err(error) => warn!(%error, "failed to render snapshot"),
  }
}

pub async fn run(command: Command, app: &App) -> anyhow::Result<()> {
  let repo = &app.repo;
  let uid = app.uid.as_str();

  match command {
    Command::New {
      text,
      mood,
      life_context,
      dreamed_at,
    } => {
      let dream = repo
        .create_dream(uid, NewDream {
          raw_text: text,
          dreamed_at,
          mood,
          life_context,
        })
        .await
        .context("failed to create dream")?;
      emit(&dream)
    }

    Command::List { status, limit } => {
      let dreams = repo
        .list_dreams(uid, DreamListOptions {
          page_size:   limit,
          only_status: status,
        })
        .await
        .context("failed to list dreams")?;
      emit(&dreams)
    }

    Command::Show { dream_id } => {
      let session = SessionAggregator::new(repo.clone())
        .get(uid, &dream_id)
        .await
        .context("failed to load dream session")?
        .ok_or_else(|| anyhow!("dream {dream_id} not found"))?;
      emit(&session)
    }

    Command::Edit {
      dream_id,
      text,
      mood,
      life_context,
      dreamed_at,
      status,
    } => {
      let patch = DreamPatch {
        raw_text: text,
        dreamed_at,
        mood,
        life_context,
        status,
      };
      repo
        .update_dream(uid, &dream_id, patch)
        .await
        .context("failed to update dream")?;
      let dream = repo.get_dream(uid, &dream_id).await?;
      emit(&dream)
    }

    Command::Element(command) => run_element(command, app).await,

    Command::Associate {
      dream_id,
      element_id,
      text,
      valence,
      salience,
    } => {
      let association = repo
        .create_association(uid, &dream_id, NewAssociation {
          element_id,
          association_text: text,
          emotional_valence: valence,
          salience,
        })
        .await
        .context("failed to create association")?;
      emit(&association)
    }

    Command::Interpret { dream_id } => {
      let interpreter =
        Interpreter::new(repo.clone(), TemplateGenerator::new(app.hypothesis_count));
      let hypotheses = interpreter
        .interpret(uid, &dream_id)
        .await
        .context("failed to interpret dream")?;
      emit(&hypotheses)
    }

    Command::Feedback {
      dream_id,
      hypothesis_id,
      response,
    } => {
      repo
        .set_hypothesis_feedback(uid, &dream_id, &hypothesis_id, response)
        .await
        .context("failed to record feedback")?;
      emit(&json!({ "hypothesisId": hypothesis_id, "userFeedback": response }))
    }

    Command::Integrate {
      dream_id,
      questions,
      practice,
    } => {
      ensure!(
        (1..=2).contains(&questions.len()),
        "expected one or two reflective questions, got {}",
        questions.len()
      );
      let integration = Integration::new(questions, practice, timestamp::now());
      repo
        .upsert_integration(uid, &dream_id, &integration)
        .await
        .context("failed to record integration")?;
      emit(&integration)
    }

    Command::Journal { dream_id, text } => {
      repo
        .update_integration_journal(uid, &dream_id, &text)
        .await
        .context("failed to update journal")?;
      emit(&repo.get_integration(uid, &dream_id).await?)
    }

    Command::Sync { dream_id } => {
      let status = StatusSynchronizer::new(repo.clone())
        .sync(uid, &dream_id)
        .await
        .context("failed to synchronise status")?;
      emit(&json!({ "dreamId": dream_id, "status": status }))
    }

    Command::Delete { dream_id } => {
      repo
        .delete_dream_hard(uid, &dream_id)
        .await
        .context("failed to delete dream")?;
      info!(dream_id, "dream deleted");
      Ok(())
    }

    Command::Watch { dream_id } => {
      let subscription = match dream_id {
        Some(dream_id) => SessionAggregator::new(repo.clone())
          .subscribe(uid, &dream_id, |session| emit_live(&session))?,
        None => repo.subscribe_dreams(uid, DreamListOptions::default(), |dreams| {
          emit_live(&dreams)
        })?,
      };
      tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
      subscription.cancel();
      Ok(())
    }

    Command::Profile => emit(&repo.get_user(uid).await?),

    Command::AcceptDisclaimer => {
      repo
        .accept_disclaimer(uid)
        .await
        .context("failed to record disclaimer acceptance")?;
      emit(&repo.get_user(uid).await?)
    }
  }
}

async fn run_element(command: ElementCommand, app: &App) -> anyhow::Result<()> {
  let repo = &app.repo;
  let uid = app.uid.as_str();

  match command {
    ElementCommand::Add {
      dream_id,
      kind,
      label,
      order,
      evidence,
    } => {
      let mut element = Element::new(kind, label, ElementSource::User, timestamp::now())
        .with_evidence(evidence);
      element.order = order;
      let id = paths::new_id();
      repo
        .upsert_element(uid, &dream_id, &id, &element)
        .await
        .context("failed to store element")?;
      emit(&Row::new(id, element))
    }

    ElementCommand::Edit {
      dream_id,
      element_id,
      kind,
      label,
      order,
      evidence,
    } => {
      let patch = ElementPatch {
        kind,
        label,
        order,
        evidence: (!evidence.is_empty()).then_some(evidence),
        ..Default::default()
      };
      repo
        .upsert_element(uid, &dream_id, &element_id, patch)
        .await
        .context("failed to update element")?;
      let elements = repo
        .list_elements(uid, &dream_id, ElementListOptions {
          include_deleted: true,
        })
        .await?;
      let edited = elements
        .into_iter()
        .find(|e| e.id == element_id)
        .ok_or_else(|| anyhow!("element {element_id} not found"))?;
      emit(&edited)
    }

    ElementCommand::Rm {
      dream_id,
      element_id,
    } => {
      repo
        .soft_delete_element(uid, &dream_id, &element_id)
        .await
        .context("failed to remove element")?;
      info!(dream_id, element_id, "element hidden");
      Ok(())
    }

    ElementCommand::List { dream_id, all } => {
      let elements = repo
        .list_elements(uid, &dream_id, ElementListOptions {
          include_deleted: all,
        })
        .await
        .context("failed to list elements")?;
      emit(&elements)
    }
  }
}
