//! Terminal play command handler.

use super::memory_manager;
use fabula_core::{ChatMessage, PLAY_AGAIN_INDEX, SpeakerRegistry, StepResult, StoryId, UserId};
use fabula_engine::{EngineConfig, SessionErrorKind, SessionManager};
use fabula_runtime::{RuntimeFactory, ScriptedFactory};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Handles the play command: a terminal session loop over in-memory stores.
///
/// Choices are entered as 1-based numbers; `restart` and `stop` map to the
/// corresponding session operations.
#[tracing::instrument(skip_all, fields(path = %path.display(), user))]
pub async fn handle_play_command(path: PathBuf, user: i64) -> anyhow::Result<()> {
    let content = std::fs::read(&path)?;
    let story = StoryId::new(
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("story"),
    );
    let user = UserId(user);

    let config = EngineConfig::default();
    let (manager, store) = memory_manager(config);
    store.insert(story.clone(), content.clone(), None).await;

    let speakers = ScriptedFactory::new()
        .speakers(&content)
        .map_err(|e| anyhow::anyhow!("unreadable script: {e}"))?;

    let result = match manager.start(user, story).await {
        Ok(result) => result,
        Err(err) => {
            println!("Could not start the story: {}", err.kind);
            std::process::exit(1);
        }
    };
    render(&manager, &speakers, &result);
    if result.is_end {
        return Ok(());
    }

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        let outcome = match input {
            "" => continue,
            "stop" | "quit" => {
                manager.stop(user).await.ok();
                println!("Stopped. See you next time.");
                break;
            }
            "restart" => manager.restart(user).await,
            _ => match input.parse::<usize>() {
                Ok(0) => {
                    println!("Choices are numbered from 1.");
                    continue;
                }
                Ok(n) => manager.advance(user, n - 1).await,
                Err(_) => {
                    println!("Enter a choice number, 'restart', or 'stop'.");
                    continue;
                }
            },
        };

        match outcome {
            Ok(result) => {
                render(&manager, &speakers, &result);
                if result.is_end {
                    break;
                }
            }
            Err(err) => match err.kind {
                SessionErrorKind::InvalidChoice { available, .. } => {
                    println!("That is not one of the {} choices.", available);
                }
                SessionErrorKind::TimeBudgetExceeded => {
                    println!("The story is taking too long; try again or 'stop'.");
                }
                SessionErrorKind::CouldNotSaveState(progress) => {
                    render(&manager, &speakers, &progress);
                    println!(
                        "(Your position could not be saved; it may be stale next time.)"
                    );
                }
                other => {
                    println!("The story cannot continue: {}", other);
                    break;
                }
            },
        }
    }
    Ok(())
}

/// Prints packed messages the way a delivery adapter would send them.
fn render(manager: &SessionManager, speakers: &SpeakerRegistry, result: &StepResult) {
    for message in fabula_pack::pack(result, speakers, &manager.config().limits) {
        match &message {
            ChatMessage::Plain(m) => println!("{}", m.text),
            ChatMessage::Attributed(m) => println!("[{}] {}", m.speaker.name, m.text),
            ChatMessage::Pacing => println!(),
        }
        for row in message.controls() {
            let rendered: Vec<String> = row
                .0
                .iter()
                .map(|control| {
                    if control.index == PLAY_AGAIN_INDEX {
                        format!("[{}]", control.label)
                    } else {
                        format!("[{}] {}", control.index + 1, control.label)
                    }
                })
                .collect();
            println!("  {}", rendered.join("  "));
        }
    }
}
