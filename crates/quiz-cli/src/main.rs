//! Interactive intake quiz in the terminal, autosaving to the server.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use services::services::{
    autosave::{
        AutosaveCoordinator, AutosaveSettings, LocalFallbackStore, SaveOutcome,
    },
    intake::SaveIntakeRequest,
    intake_api::IntakeApiClient,
    local_fallback::FileFallbackStore,
    quiz_config::quiz,
    quiz_flow::{NextStep, QuizFlowError, QuizState},
};
use tracing::{info, warn};
use utils::logging::init_tracing;
use uuid::Uuid;

mod prompt;

#[derive(Debug, Parser)]
#[command(name = "energy-intake", about = "Fill in the home-energy intake quiz")]
struct Cli {
    /// Base URL of the intake server
    #[arg(long, env = "INTAKE_SERVER", default_value = "http://127.0.0.1:3001")]
    server: String,

    /// Resume an existing session instead of starting a new one
    #[arg(long)]
    session: Option<Uuid>,

    #[arg(long, env = "INTAKE_USER")]
    user: Option<String>,

    /// Quiet period before an answer is autosaved
    #[arg(long, env = "INTAKE_DEBOUNCE_MS", default_value_t = 300)]
    debounce_ms: u64,

    #[arg(long, env = "INTAKE_SAVE_TIMEOUT_SECS", default_value_t = 5)]
    save_timeout_secs: u64,

    #[arg(long, env = "INTAKE_COMPLETE_TIMEOUT_SECS", default_value_t = 15)]
    complete_timeout_secs: u64,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log: String,
}

fn snapshot(session_id: Uuid, user_id: &Option<String>, state: &QuizState) -> SaveIntakeRequest {
    SaveIntakeRequest {
        session_id,
        user_id: user_id.clone(),
        responses: state.responses.clone(),
        current_step: state.current_step.clone(),
        disciplines: state.disciplines.clone(),
    }
}

/// Local copy first, since it may hold answers the server never received.
async fn resume(
    session_id: Uuid,
    client: &IntakeApiClient,
    store: &FileFallbackStore,
) -> Result<QuizState> {
    let mut state = QuizState::new();

    let saved = match store.load(session_id).await {
        Ok(Some(local)) => Some(local),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable local copy");
            None
        }
    };
    let saved = match saved {
        Some(local) => Some(local),
        None => match client.load(session_id).await {
            Ok(Some(remote)) => Some(SaveIntakeRequest {
                session_id,
                user_id: remote.user_id,
                responses: remote.responses,
                current_step: remote.current_step,
                disciplines: remote.disciplines,
            }),
            Ok(None) => None,
            Err(e) => {
                println!("{}", e.user_message());
                None
            }
        },
    };

    if let Some(saved) = saved {
        if quiz().question_by_id(&saved.current_step).is_some() {
            state.current_step = saved.current_step;
        }
        state.responses = saved.responses;
        state.disciplines = saved.disciplines;
        info!(%session_id, step = %state.current_step, "Resumed intake session");
    }
    Ok(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let settings = AutosaveSettings {
        debounce: Duration::from_millis(cli.debounce_ms),
        save_timeout: Duration::from_secs(cli.save_timeout_secs),
        complete_timeout: Duration::from_secs(cli.complete_timeout_secs),
    };
    let client = IntakeApiClient::new(&cli.server)
        .context("invalid --server")?
        .with_timeouts(settings.save_timeout, settings.complete_timeout);
    let store = FileFallbackStore::in_data_dir();
    let session_id = cli.session.unwrap_or_else(Uuid::new_v4);

    let mut state = match cli.session {
        Some(id) => resume(id, &client, &store).await?,
        None => QuizState::new(),
    };

    let coordinator = AutosaveCoordinator::new(Arc::new(client), Arc::new(store), settings);

    println!("Session {session_id}");
    let config = quiz();

    loop {
        let Some(step) = config.question_by_id(&state.current_step) else {
            bail!("unknown quiz step {}", state.current_step);
        };
        let value = prompt::ask(step, state.answer_for(step))?;

        match state.answer(config, &step.id, value) {
            Ok(NextStep::Step(_)) => {
                coordinator
                    .schedule(snapshot(session_id, &cli.user, &state))
                    .await;
            }
            Ok(NextStep::Complete) => break,
            Err(QuizFlowError::Validation(e)) => {
                println!("{e}");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(SaveOutcome::LocalOnly { warning }) = coordinator.flush().await {
        println!("{warning}");
    }

    match coordinator
        .complete(&snapshot(session_id, &cli.user, &state))
        .await
    {
        Ok(completed) => {
            println!("Profile {} created.", completed.profile_id);
            println!(
                "{}",
                serde_json::to_string_pretty(&completed.normalized_profile)?
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", e.user_message());
            println!("Resume later with --session {session_id}");
            Err(e.into())
        }
    }
}
