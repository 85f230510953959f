// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Interrupt handling for long-running commands.

use std::future::Future;

use tracing::{info, warn};

/// Waits for SIGINT or SIGTERM (Ctrl+C elsewhere).
///
/// If the handlers cannot be installed the future never resolves, so the
/// guarded work simply runs to completion.
pub async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to register signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to register Ctrl+C handler");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
    }
}

/// Runs `future` until it finishes or an interrupt arrives.
///
/// Returns `None` if interrupted.
pub async fn run_until_interrupted<F, T>(future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::pin!(future);
    let interrupt = wait_for_interrupt();
    tokio::pin!(interrupt);

    tokio::select! {
        result = &mut future => Some(result),
        _ = &mut interrupt => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_future_wins() {
        let result = run_until_interrupted(async { 42 }).await;
        assert_eq!(result, Some(42));
    }
}
