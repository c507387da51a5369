//! Interactive terminal confirmer
//!
//! Implements the guard's confirmation seam with dialoguer prompts. On
//! top of the guard's own tiering this adds a cancellable countdown after
//! the final yes, so an operator still has a window to Ctrl-C out.

use async_trait::async_trait;
use cell_guard::Confirmer;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct TerminalConfirmer {
    /// Countdown after the final yes, in seconds; 0 disables it
    countdown_secs: u64,
}

impl TerminalConfirmer {
    pub fn new(countdown_secs: u64) -> Self {
        Self { countdown_secs }
    }
}

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let confirmed = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false);

        if confirmed && self.countdown_secs > 0 {
            return countdown(self.countdown_secs).await;
        }
        confirmed
    }

    async fn confirm_typed(&self, prompt: &str, expected: &str) -> bool {
        let prompt = format!("{prompt}\nType {expected:?} to continue");
        let expected = expected.to_string();
        tokio::task::spawn_blocking(move || {
            let typed: String = dialoguer::Input::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .unwrap_or_default();
            typed == expected
        })
        .await
        .unwrap_or(false)
    }
}

async fn countdown(secs: u64) -> bool {
    let bar = ProgressBar::new(secs);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:20}] {pos}/{len}s")
            .unwrap(),
    );
    bar.set_message("Executing, Ctrl-C aborts");

    for _ in 0..secs {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => bar.inc(1),
            _ = tokio::signal::ctrl_c() => {
                bar.finish_with_message("Aborted");
                return false;
            }
        }
    }
    bar.finish_with_message("Proceeding");
    true
}
