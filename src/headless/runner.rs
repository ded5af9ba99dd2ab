//! Headless replay runner
//!
//! Drives a [`PollsEngine`] over the in-memory backend, one script step at a
//! time, and writes engine events, failures and snapshots as NDJSON.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use polls_app::config::load_settings;
use polls_app::{EngineEvent, PollsEngine, Settings};
use polls_core::prelude::*;
use polls_core::{Channel, OptionId, Poll};
use polls_realtime::InMemoryBackend;

use super::script::{parse_step, FailTarget, ScriptStep};
use super::{HeadlessEvent, HeadlessOutput};

type ReplayEngine = PollsEngine<InMemoryBackend, InMemoryBackend>;

/// What a finished replay did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Steps executed (comments and blank lines excluded)
    pub steps: usize,
    /// NDJSON lines written
    pub lines: usize,
}

/// Replay `script_path` with settings from `project_path`, writing to stdout
pub async fn run_replay(script_path: &Path, project_path: &Path) -> Result<ReplaySummary> {
    info!("═══════════════════════════════════════════════════════");
    info!("LivePolls replay: {}", script_path.display());
    info!("Project: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(project_path);
    let file = std::fs::File::open(script_path)
        .context(format!("Failed to open script {}", script_path.display()))?;

    let summary = run_script(BufReader::new(file), io::stdout(), settings).await?;
    info!(
        "Replay finished: {} steps, {} events",
        summary.steps, summary.lines
    );
    Ok(summary)
}

/// Replay a script read from `reader`, writing NDJSON to `writer`.
///
/// Step failures are reported as events and the replay continues; an
/// unparseable line is fatal.
pub async fn run_script<R: BufRead, W: Write>(
    reader: R,
    writer: W,
    settings: Settings,
) -> Result<ReplaySummary> {
    let backend = Arc::new(InMemoryBackend::with_topics(
        settings.realtime.topic(Channel::Polls),
        settings.realtime.topic(Channel::Options),
    ));
    let mut engine = PollsEngine::new(backend.clone(), backend.clone(), settings);
    let mut events = engine.subscribe();
    let mut output = HeadlessOutput::new(writer);
    let mut steps = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;

        let step = match parse_step(&line) {
            None => continue,
            Some(Ok(step)) => step,
            Some(Err(e)) => {
                error!("Invalid step on line {}: {}", line_no, e);
                output.emit(&HeadlessEvent::error(
                    Some(line_no),
                    format!("invalid step: {}", e),
                    true,
                ))?;
                engine.shutdown().await;
                forward_events(&mut events, &mut output)?;
                return Err(e);
            }
        };

        debug!("Line {}: {}", line_no, step.name());
        steps += 1;

        if step == ScriptStep::Snapshot {
            let polls = engine.polls();
            output.emit(&HeadlessEvent::snapshot(
                engine.connection_state(),
                engine.view_state(),
                polls.iter().map(|poll| &**poll),
            ))?;
            continue;
        }

        let result = execute(&mut engine, &backend, step).await;
        forward_events(&mut events, &mut output)?;

        if let Some(detail) = engine.take_failure() {
            output.emit(&HeadlessEvent::failure(detail))?;
        } else if let Err(e) = result {
            warn!("Step on line {} failed: {}", line_no, e);
            output.emit(&HeadlessEvent::error(Some(line_no), e.to_string(), e.is_fatal()))?;
        }
    }

    engine.shutdown().await;
    forward_events(&mut events, &mut output)?;

    Ok(ReplaySummary {
        steps,
        lines: output.written(),
    })
}

async fn execute(
    engine: &mut ReplayEngine,
    backend: &InMemoryBackend,
    step: ScriptStep,
) -> Result<()> {
    match step {
        ScriptStep::Seed { polls } => {
            let mut rows = Vec::with_capacity(polls.len());
            let mut options = Vec::new();
            for seed in polls {
                let (poll, poll_options) = seed.into_rows();
                rows.push(poll);
                options.extend(poll_options);
            }
            backend.seed(rows, options).await;
            Ok(())
        }
        ScriptStep::Start => engine.start().await,
        ScriptStep::Refresh => engine.refresh().await,
        ScriptStep::Connect => engine.connect().await.map(|_| ()),
        ScriptStep::Disconnect => engine.disconnect().await,
        ScriptStep::Signal { signal } => engine.handle_signal(signal).await,
        ScriptStep::CreatePoll { name, options } => {
            engine.create_poll(Poll::with_options(name, options)).await
        }
        ScriptStep::Increment { poll, option } => {
            let option_id = find_option(backend, &poll, &option).await?;
            engine.increment_option(option_id).await
        }
        ScriptStep::Inject { channel, payload } => {
            if !backend.publish(channel, payload).await {
                debug!("Injected payload on {} was not delivered", channel);
            }
            Ok(())
        }
        ScriptStep::FailNext { target, message } => {
            match target {
                FailTarget::Store(op) => backend.fail_next(op, message).await,
                FailTarget::Transport(_) => backend.fail_next_connect(message).await,
            }
            Ok(())
        }
        ScriptStep::Settle { quiet_ms } => {
            let processed = engine.settle(Duration::from_millis(quiet_ms)).await;
            trace!("Settled after {} messages", processed);
            Ok(())
        }
        ScriptStep::Snapshot => Ok(()),
    }
}

/// Look an option up by poll and option name among the backend rows
async fn find_option(backend: &InMemoryBackend, poll_name: &str, option_name: &str) -> Result<OptionId> {
    let (polls, options) = backend.rows().await;
    let poll = polls
        .iter()
        .find(|p| p.name == poll_name)
        .ok_or_else(|| Error::not_found("poll", poll_name))?;

    options
        .iter()
        .find(|o| o.poll_id == poll.id && o.name == option_name)
        .map(|o| o.id)
        .ok_or_else(|| Error::not_found("option", option_name))
}

/// Write every engine event received so far
fn forward_events<W: Write>(
    events: &mut broadcast::Receiver<EngineEvent>,
    output: &mut HeadlessOutput<W>,
) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => output.emit_engine(&event)?,
            Err(TryRecvError::Lagged(missed)) => {
                warn!("Headless output lagged, {} engine events lost", missed);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}
