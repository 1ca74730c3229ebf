//! Multi-round voting for one detection cycle.
//!
//! Each round samples a frame, asks the classifier about it and records a
//! vote. The rule policy is consulted after every vote; the first
//! non-trivial action is dispatched and ends the cycle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{Classifier, SnapshotSource};
use crate::dispatch::ActionDispatcher;
use crate::error::MonitorResult;
use crate::events::ActionEvent;
use crate::rules::{EscalationAction, RulePolicy};
use crate::verdict::{parse_reply, Verdict};

/// Outcome of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Ok,
    Fail,
    /// No usable verdict. Neither evidence of failure nor of success.
    Inconclusive,
}

impl Vote {
    pub fn from_verdict(verdict: Option<&Verdict>) -> Self {
        match verdict {
            Some(v) if v.is_fail() => Self::Fail,
            Some(_) => Self::Ok,
            None => Self::Inconclusive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
            Self::Inconclusive => "inconclusive",
        }
    }
}

/// Votes of one cycle, in round order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VotingRound {
    votes: Vec<Vote>,
}

impl VotingRound {
    pub fn push(&mut self, vote: Vote) {
        self.votes.push(vote);
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn fail_count(&self) -> u32 {
        self.votes.iter().filter(|v| **v == Vote::Fail).count() as u32
    }

    pub fn contains_fail(&self) -> bool {
        self.votes.contains(&Vote::Fail)
    }
}

impl FromIterator<Vote> for VotingRound {
    fn from_iter<I: IntoIterator<Item = Vote>>(iter: I) -> Self {
        Self {
            votes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for VotingRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, vote) in self.votes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(vote.as_str())?;
        }
        f.write_str("]")
    }
}

/// Parameters for one cycle, snapshotted from the session when the tick
/// starts.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub rounds: u32,
    pub round_delay: Duration,
    pub policy: RulePolicy,
    pub system_prompt: String,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A non-trivial action was dispatched; later rounds were skipped.
    Escalated {
        action: EscalationAction,
        votes: VotingRound,
    },
    /// No fail recorded and no rounds left that could produce one.
    EarlyExit { votes: VotingRound },
    /// Every round ran without escalating.
    Completed { votes: VotingRound },
    /// The monitor was stopped mid-cycle.
    Cancelled { votes: VotingRound },
}

impl CycleOutcome {
    pub fn votes(&self) -> &VotingRound {
        match self {
            Self::Escalated { votes, .. }
            | Self::EarlyExit { votes }
            | Self::Completed { votes }
            | Self::Cancelled { votes } => votes,
        }
    }

    pub fn action(&self) -> EscalationAction {
        match self {
            Self::Escalated { action, .. } => *action,
            _ => EscalationAction::None,
        }
    }
}

/// Sample → classify → vote, repeated up to `rounds` times.
pub struct VotingSequence {
    snapshots: Arc<dyn SnapshotSource>,
    classifier: Arc<dyn Classifier>,
    dispatcher: ActionDispatcher,
}

impl VotingSequence {
    pub fn new(
        snapshots: Arc<dyn SnapshotSource>,
        classifier: Arc<dyn Classifier>,
        dispatcher: ActionDispatcher,
    ) -> Self {
        Self {
            snapshots,
            classifier,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Run one cycle.
    ///
    /// Evidence failures never surface here; the only errors are those of
    /// the dispatched action.
    pub async fn run(
        &self,
        plan: &CyclePlan,
        cancel: &CancellationToken,
    ) -> MonitorResult<CycleOutcome> {
        let rounds = plan.rounds;
        let mut votes = VotingRound::default();
        let mut last_verdict: Option<Verdict> = None;

        for round in 0..rounds {
            if cancel.is_cancelled() {
                info!(round = round + 1, "Monitor stopped; abandoning voting cycle");
                return Ok(CycleOutcome::Cancelled { votes });
            }

            let verdict = self.sample(round + 1, &plan.system_prompt).await;
            let vote = Vote::from_verdict(verdict.as_ref());
            votes.push(vote);
            if verdict.is_some() {
                last_verdict = verdict;
            }

            let fails = votes.fail_count();
            let action = plan.policy.evaluate(fails, rounds);
            debug!(
                round = round + 1,
                rounds,
                vote = vote.as_str(),
                fails,
                action = %action,
                "Round complete"
            );

            if action != EscalationAction::None {
                let event = ActionEvent::new(action, votes.clone(), last_verdict.as_ref());
                self.dispatcher.dispatch(&event).await?;
                return Ok(CycleOutcome::Escalated { action, votes });
            }

            let remaining = rounds - (round + 1);
            let max_possible_fails = fails + remaining;
            if max_possible_fails == 0 {
                debug!(votes = %votes, "No failing votes possible; ending cycle");
                return Ok(CycleOutcome::EarlyExit { votes });
            }
            if remaining == 0 {
                break;
            }

            if !plan.round_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(round = round + 1, "Monitor stopped during round delay");
                        return Ok(CycleOutcome::Cancelled { votes });
                    }
                    _ = tokio::time::sleep(plan.round_delay) => {}
                }
            }
        }

        if votes.contains_fail() {
            let event = ActionEvent::new(EscalationAction::None, votes.clone(), last_verdict.as_ref());
            self.dispatcher.dispatch(&event).await?;
        }
        Ok(CycleOutcome::Completed { votes })
    }

    /// One round's evidence. `None` means inconclusive.
    async fn sample(&self, round: u32, system_prompt: &str) -> Option<Verdict> {
        let image = match self.snapshots.capture().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(round, error = %e, "Snapshot capture failed; vote is inconclusive");
                return None;
            }
        };

        let reply = match self.classifier.classify(&image, system_prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(round, error = %e, "Classifier request failed; vote is inconclusive");
                return None;
            }
        };

        let verdict = parse_reply(&reply);
        if verdict.is_none() {
            warn!(round, "Classifier reply carried no verdict; vote is inconclusive");
        }
        verdict
    }
}
