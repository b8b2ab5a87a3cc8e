use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::command::{Command, ConduitId};
use crate::error::Result;
use crate::session::Session;

/// Conduits the session has joined.
///
/// The set is updated by the connection's writer right after the matching
/// command is flushed, so it follows the order commands reach the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    joined: BTreeSet<ConduitId>,
}

/// Membership update carried with a join or leave frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MembershipChange {
    Join(ConduitId),
    Leave(ConduitId),
}

/// Commands needed to move from the current membership to a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Conduits to leave, in name order.
    pub leave: Vec<ConduitId>,
    /// Conduits to join, in name order.
    pub join: Vec<ConduitId>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.leave.is_empty() && self.join.is_empty()
    }
}

impl Membership {
    pub fn contains(&self, conduit: &str) -> bool {
        self.joined.contains(conduit)
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    /// Joined conduits in name order.
    pub fn snapshot(&self) -> Vec<ConduitId> {
        self.joined.iter().cloned().collect()
    }

    pub(crate) fn apply(&mut self, change: MembershipChange) {
        match change {
            MembershipChange::Join(conduit) => {
                self.joined.insert(conduit);
            }
            MembershipChange::Leave(conduit) => {
                self.joined.remove(conduit.as_str());
            }
        }
    }

    /// Diff against `desired`.
    pub fn plan(&self, desired: &BTreeSet<ConduitId>) -> ReconcilePlan {
        ReconcilePlan {
            leave: self.joined.difference(desired).cloned().collect(),
            join: desired.difference(&self.joined).cloned().collect(),
        }
    }
}

impl Session {
    /// Join `conduit`.
    pub async fn join(&self, conduit: impl Into<ConduitId>) -> Result<()> {
        let conduit = conduit.into();
        self.send_with(
            Command::connect(conduit.clone()),
            Some(MembershipChange::Join(conduit.clone())),
        )
        .await?;
        info!(%conduit, "joined conduit");
        Ok(())
    }

    /// Leave `conduit`.
    pub async fn leave(&self, conduit: impl Into<ConduitId>) -> Result<()> {
        let conduit = conduit.into();
        self.send_with(
            Command::disconnect(conduit.clone()),
            Some(MembershipChange::Leave(conduit.clone())),
        )
        .await?;
        info!(%conduit, "left conduit");
        Ok(())
    }

    /// Bring the membership in line with `desired`: leaves first, then
    /// joins, each in name order. Stops at the first failed send; conduits
    /// handled before it stay updated.
    pub async fn reconcile<I, C>(&self, desired: I) -> Result<ReconcilePlan>
    where
        I: IntoIterator<Item = C>,
        C: Into<ConduitId>,
    {
        let desired: BTreeSet<ConduitId> = desired.into_iter().map(Into::into).collect();
        let plan = self.shared().membership.lock().plan(&desired);
        debug!(
            leave = plan.leave.len(),
            join = plan.join.len(),
            "reconciling conduits"
        );

        for conduit in &plan.leave {
            self.leave(conduit.clone()).await?;
        }
        for conduit in &plan.join {
            self.join(conduit.clone()).await?;
        }
        Ok(plan)
    }

    /// Snapshot of the joined conduits, in name order.
    pub fn joined(&self) -> Vec<ConduitId> {
        self.shared().membership.lock().snapshot()
    }

    /// Re-send a join for every conduit in the membership, typically after
    /// reopening. Returns how many joins were sent.
    pub async fn rejoin(&self) -> Result<usize> {
        let conduits = self.joined();
        for conduit in &conduits {
            self.send(Command::connect(conduit.clone())).await?;
        }
        if !conduits.is_empty() {
            info!(count = conduits.len(), "rejoined conduits");
        }
        Ok(conduits.len())
    }
}
