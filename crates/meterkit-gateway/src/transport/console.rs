//! Console trigger: every line on stdin runs one manual collection.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::app_state::AppState;

pub async fn run_stdin(state: AppState) {
    run(state, BufReader::new(tokio::io::stdin())).await;
}

/// Collect once per input line until EOF or shutdown.
pub async fn run<R: AsyncBufRead + Unpin>(state: AppState, input: R) {
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(_)) => {
                if state.is_draining() {
                    break;
                }
                if let Err(e) = state.collect_console().await {
                    tracing::warn!(code = e.code().as_str(), error = %e, "console collection failed");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
    tracing::debug!("console trigger stopped");
}
