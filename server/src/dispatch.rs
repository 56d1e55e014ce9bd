//! The logging middleware every tool dispatch passes through.
//! Shared by the MCP and HTTP front ends so the two surfaces observe calls
//! identically: a tracing span per call, the method name and a truncated
//! params preview, wall-clock timing, and a level that escalates with cost
//! or failure. Never changes the outcome, only observes it.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::Instrument;

use tools::error::{ToolError, ToolResult};

const PARAMS_PREVIEW_CHARS: usize = 200;
const SLOW_CALL_THRESHOLD_MS: u128 = 100;
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

fn truncate_params(params: &impl Serialize) -> String {
    let raw = serde_json::to_string(params).unwrap_or_default();
    if raw.chars().count() <= PARAMS_PREVIEW_CHARS {
        raw
    } else {
        let truncated: String = raw.chars().take(PARAMS_PREVIEW_CHARS).collect();
        format!("{truncated}…")
    }
}

/// Runs `call` with `args`, logging its name, truncated params, and timing.
/// DEBUG for routine calls, WARN once a call crosses the slow threshold,
/// ERROR when the tool itself reports a failure.
pub async fn dispatch_logged<Args, Fut>(
    tool_name: &'static str,
    args: Args,
    call: impl FnOnce(Args) -> Fut,
) -> ToolResult
where
    Args: Serialize,
    Fut: Future<Output = ToolResult>,
{
    let params_preview = truncate_params(&args);
    let span = tracing::info_span!("tool_call", tool = tool_name, params = %params_preview);

    async move {
        let start = Instant::now();
        let result = match tokio::time::timeout(DISPATCH_TIMEOUT, call(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError {
                kind: "timeout",
                message: format!("{tool_name} exceeded the {}s dispatch deadline", DISPATCH_TIMEOUT.as_secs()),
                recovery_hint: Some("retry with a longer deadline".to_string()),
            }),
        };
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Err(err) => {
                tracing::error!(elapsed_ms, kind = err.kind, message = %err.message, "tool call failed");
            }
            Ok(_) if u128::from(elapsed_ms) > SLOW_CALL_THRESHOLD_MS => {
                tracing::warn!(elapsed_ms, "slow tool call");
            }
            Ok(_) => {
                tracing::debug!(elapsed_ms, "tool call completed");
            }
        }

        result
    }
    .instrument(span)
    .await
}
