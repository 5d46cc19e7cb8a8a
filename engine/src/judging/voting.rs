//! Aggregation of judge verdicts into a debate decision
//!
//! The aggregate is a pure function of the persisted verdict set of one
//! pass, so it can be re-derived at any time without calling judges again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::Verdict;
use crate::debate::UserId;

/// Tally of one adjudication pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Plurality winner; `None` is a tie.
    pub winner_id: Option<UserId>,
    /// Votes per declared winner, ordered by user id.
    pub tally: Vec<(UserId, u32)>,
    /// Judges that declared a tie.
    pub abstentions: u32,
    /// Verdicts counted.
    pub verdicts: u32,
}

impl Aggregate {
    pub fn is_tie(&self) -> bool {
        self.winner_id.is_none()
    }

    /// Difference between the top two tallies.
    pub fn margin(&self) -> u32 {
        let mut counts: Vec<u32> = self.tally.iter().map(|(_, c)| *c).collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        match counts.as_slice() {
            [] => 0,
            [only] => *only,
            [first, second, ..] => first - second,
        }
    }
}

/// Aggregate the verdicts of one pass.
///
/// Each verdict naming a winner is one vote for that user; tie declarations
/// abstain. A strictly larger tally wins, anything else (even split, all
/// ties) is an overall tie. Returns `None` for an empty set, which means
/// the pass is still pending rather than tied.
pub fn aggregate(verdicts: &[Verdict]) -> Option<Aggregate> {
    if verdicts.is_empty() {
        return None;
    }

    let mut votes: BTreeMap<UserId, u32> = BTreeMap::new();
    let mut abstentions = 0;
    for verdict in verdicts {
        match &verdict.winner_id {
            Some(winner) => *votes.entry(winner.clone()).or_insert(0) += 1,
            None => abstentions += 1,
        }
    }

    let top = votes.values().copied().max().unwrap_or(0);
    let mut leaders = votes.iter().filter(|(_, count)| **count == top);
    let winner_id = match (leaders.next(), leaders.next()) {
        (Some((user, _)), None) => Some(user.clone()),
        _ => None,
    };

    Some(Aggregate {
        winner_id,
        tally: votes.into_iter().collect(),
        abstentions,
        verdicts: verdicts.len() as u32,
    })
}
