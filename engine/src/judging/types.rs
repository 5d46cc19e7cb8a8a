//! Judges, rulings, verdict rows and the transcript handed to judges.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::debate::{Debate, DebateId, JudgeId, Position, Side, Statement, UserId, VerdictId};

/// A named scoring persona. Static reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judge {
    pub id: JudgeId,
    pub name: String,
    /// Instructions describing how this judge weighs arguments.
    pub persona: String,
}

impl Judge {
    pub fn new(id: impl Into<JudgeId>, name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persona: persona.into(),
        }
    }
}

/// Ordered set of judges that rule on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgePanel {
    judges: Vec<Judge>,
}

impl JudgePanel {
    /// Build a panel, keeping the first judge for each repeated id.
    pub fn new(judges: impl IntoIterator<Item = Judge>) -> Self {
        let mut seen = HashSet::new();
        let judges = judges
            .into_iter()
            .filter(|j| seen.insert(j.id.clone()))
            .collect();
        Self { judges }
    }

    pub fn judges(&self) -> &[Judge] {
        &self.judges
    }

    pub fn len(&self) -> usize {
        self.judges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.judges.is_empty()
    }

    pub fn get(&self, id: &JudgeId) -> Option<&Judge> {
        self.judges.iter().find(|j| j.id == *id)
    }

    /// Judges with no verdict among `existing`.
    pub fn missing_from<'a>(&'a self, existing: &[Verdict]) -> Vec<&'a Judge> {
        self.judges
            .iter()
            .filter(|j| !existing.iter().any(|v| v.judge_id == j.id))
            .collect()
    }
}

/// Which side a judge declared the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Challenger,
    Opponent,
    Tie,
}

impl Decision {
    pub fn side(self) -> Option<Side> {
        match self {
            Decision::Challenger => Some(Side::Challenger),
            Decision::Opponent => Some(Side::Opponent),
            Decision::Tie => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Challenger => write!(f, "challenger"),
            Decision::Opponent => write!(f, "opponent"),
            Decision::Tie => write!(f, "tie"),
        }
    }
}

/// One judge's structured answer for one debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRuling {
    pub challenger_score: f32,
    pub opponent_score: f32,
    pub decision: Decision,
    pub rationale: String,
}

/// A persisted judge ruling for one adjudication pass. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub id: VerdictId,
    pub debate_id: DebateId,
    pub judge_id: JudgeId,
    /// 0 for the original judging, n for the n-th appeal.
    pub pass: u32,
    pub decision: Decision,
    /// The user the decision names; `None` for a tie.
    pub winner_id: Option<UserId>,
    pub challenger_score: f32,
    pub opponent_score: f32,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl Verdict {
    pub fn from_ruling(
        debate: &Debate,
        judge_id: &JudgeId,
        pass: u32,
        ruling: JudgeRuling,
        now: DateTime<Utc>,
    ) -> Self {
        let winner_id = ruling
            .decision
            .side()
            .and_then(|side| debate.participant(side).cloned());
        Self {
            id: VerdictId::generate(),
            debate_id: debate.id.clone(),
            judge_id: judge_id.clone(),
            pass,
            decision: ruling.decision,
            winner_id,
            challenger_score: ruling.challenger_score,
            opponent_score: ruling.opponent_score,
            rationale: ruling.rationale,
            created_at: now,
        }
    }
}

/// A participant as presented to judges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub position: Position,
}

/// Both sides' statements for one round. A missing statement is an empty position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRound {
    pub round: u32,
    pub challenger: Option<String>,
    pub opponent: Option<String>,
}

impl TranscriptRound {
    pub fn text(&self, side: Side) -> &str {
        let text = match side {
            Side::Challenger => &self.challenger,
            Side::Opponent => &self.opponent,
        };
        text.as_deref().unwrap_or("")
    }
}

/// Everything a judge sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationRequest {
    pub debate_id: DebateId,
    pub pass: u32,
    pub topic: String,
    pub category: String,
    pub challenger: Participant,
    pub opponent: Participant,
    /// One entry per round, 1..=total_rounds, including silent rounds.
    pub rounds: Vec<TranscriptRound>,
}

impl AdjudicationRequest {
    /// Build the transcript for `pass`. Returns `None` while the debate has
    /// no opponent.
    pub fn build(debate: &Debate, statements: &[Statement], pass: u32) -> Option<Self> {
        let opponent_id = debate.opponent_id.clone()?;

        let rounds = (1..=debate.total_rounds)
            .map(|round| {
                let text_of = |user: &UserId| {
                    statements
                        .iter()
                        .find(|s| s.round == round && s.author_id == *user)
                        .map(|s| s.content.clone())
                };
                TranscriptRound {
                    round,
                    challenger: text_of(&debate.challenger_id),
                    opponent: text_of(&opponent_id),
                }
            })
            .collect();

        Some(Self {
            debate_id: debate.id.clone(),
            pass,
            topic: debate.topic.clone(),
            category: debate.category.clone(),
            challenger: Participant {
                user_id: debate.challenger_id.clone(),
                position: debate.position_of(Side::Challenger),
            },
            opponent: Participant {
                user_id: opponent_id,
                position: debate.position_of(Side::Opponent),
            },
            rounds,
        })
    }

    /// Whether neither side said anything in any round.
    pub fn is_silent(&self) -> bool {
        self.rounds
            .iter()
            .all(|r| r.challenger.is_none() && r.opponent.is_none())
    }
}
