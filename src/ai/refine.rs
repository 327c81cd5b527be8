use tracing::{debug, instrument};

use super::client::ModelClient;
use super::error::AiError;
use super::preferences::{prefix_prompt, AiPreferences};

pub const MIN_REASONING_CYCLES: i64 = 1;
pub const MAX_REASONING_CYCLES: i64 = 4;

pub fn effective_cycles(explicit: Option<i64>, prefs: &AiPreferences) -> usize {
    let requested = explicit.unwrap_or(i64::from(prefs.reasoning_cycles));
    requested.clamp(MIN_REASONING_CYCLES, MAX_REASONING_CYCLES) as usize
}

fn refine_prompt(previous: &str, prefs: &AiPreferences) -> String {
    let prompt = format!(
        "Revise and improve the following answer keeping it clear and coherent. \
         Reply only with the final version in {}.\n\nANSWER:\n{previous}",
        prefs.language_label()
    );
    match &prefs.system_prompt {
        Some(system) => format!("{system}\n\n{prompt}"),
        None => prompt,
    }
}

/// Free-text generation with optional self-refinement. Each cycle after the
/// first rewrites the previous answer, so cycles run strictly in sequence.
/// Any failing cycle fails the whole call.
#[instrument(skip(client, prompt, prefs))]
pub async fn generate_text(
    client: &dyn ModelClient,
    prompt: &str,
    prefs: &AiPreferences,
    cycles: Option<i64>,
) -> Result<String, AiError> {
    let total = effective_cycles(cycles, prefs);
    let mut req = prefs.text_request(prefix_prompt(prompt, prefs, false), false);
    let mut answer = client.generate(&req).await?;

    for cycle in 2..=total {
        debug!(cycle, total, "refinement cycle");
        req.prompt = refine_prompt(&answer, prefs);
        answer = client.generate(&req).await?;
    }
    Ok(answer)
}
