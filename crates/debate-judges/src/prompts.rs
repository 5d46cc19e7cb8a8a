//! Prompt templates for judge calls.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes.
//! Every judge call logs it, so a change in ruling behaviour can be traced
//! back to the prompt that produced it.

use std::fmt::Write;

use debate_engine::{AdjudicationRequest, Judge, Side};

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Shared preamble; the persona is appended per judge.
pub const JUDGE_PREAMBLE: &str = "\
You are a judge on a competitive debate platform. Two participants argued \
opposite positions on a topic over a fixed number of rounds. Read the full \
transcript and decide who argued better.

## Rules
- Judge only what is written in the transcript. Do not reward a position \
  because you agree with it.
- A round marked (no statement) means that participant said nothing. Silence \
  is an empty position and counts against the silent side.
- Score each side from 0 to 10.
- Declare a tie only if you genuinely cannot separate them.

## Output
Respond with a single JSON object and nothing else:
{\"challenger_score\": <0-10>, \"opponent_score\": <0-10>, \
\"winner\": \"challenger\" | \"opponent\" | \"tie\", \"rationale\": \"<2-4 sentences>\"}";

/// System prompt for one judge.
pub fn system_prompt(judge: &Judge) -> String {
    format!(
        "{}\n\n## Your persona: {}\n{}",
        JUDGE_PREAMBLE, judge.name, judge.persona
    )
}

/// User prompt carrying the topic and the round-by-round transcript.
pub fn user_prompt(request: &AdjudicationRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**Topic:** {}", request.topic);
    let _ = writeln!(out, "**Category:** {}", request.category);
    let _ = writeln!(
        out,
        "**Challenger** argues {}. **Opponent** argues {}.",
        request.challenger.position, request.opponent.position
    );
    if request.pass > 0 {
        let _ = writeln!(
            out,
            "This is an appeal. Judge the transcript afresh."
        );
    }

    for round in &request.rounds {
        let _ = writeln!(out, "\n### Round {}", round.round);
        for (label, side) in [("Challenger", Side::Challenger), ("Opponent", Side::Opponent)] {
            let text = round.text(side);
            if text.trim().is_empty() {
                let _ = writeln!(out, "{}: (no statement)", label);
            } else {
                let _ = writeln!(out, "{}: {}", label, text.trim());
            }
        }
    }
    out
}
