//! Console interface adapter
//!
//! A single `select!` loop over stdin lines and the notification queue:
//! input is forwarded to the assistant, notifications are rendered as they
//! arrive. The loop never blocks on pipeline work.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::{Notification, PlaybackState};
use crate::assistant::AssistantHandle;
use crate::Result;

/// Run the console loop until `exit`, end of input, or assistant shutdown.
///
/// # Errors
///
/// Returns an error if stdin fails or the assistant stops accepting
/// submissions.
pub async fn run_console(
    handle: AssistantHandle,
    mut notifications: mpsc::Receiver<Notification>,
    assistant_name: &str,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type your message and press Enter (\"exit\" to quit).");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if text.eq_ignore_ascii_case("exit") {
                        println!("Ending chat. Cheerio!");
                        break;
                    }
                    handle.submit(text).await?;
                }
                None => break,
            },
            notification = notifications.recv() => match notification {
                Some(Notification::Reply(text)) => {
                    println!("{assistant_name}: {text}");
                }
                Some(Notification::Error { kind, message }) => {
                    eprintln!("error ({kind}): {message}");
                }
                Some(Notification::Playback(state)) => {
                    match state {
                        PlaybackState::Started => {
                            tracing::debug!("playback started");
                        }
                        PlaybackState::Finished | PlaybackState::Cancelled => {
                            tracing::debug!(?state, "playback ended");
                        }
                        PlaybackState::Failed => {
                            eprintln!("(voice output unavailable for this reply)");
                        }
                    }
                }
                None => break,
            }
        }
    }

    Ok(())
}
