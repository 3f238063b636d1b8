use super::models::{Decision, DecisionRecord, Identity, ItemId, NewDecision};
use anyhow::Result;

pub trait InteractionStore: Send + Sync {
    /// Appends a decision record and returns its id.
    fn append_decision(&self, decision: NewDecision) -> Result<usize>;

    /// Returns up to `limit` of the identity's most recent decisions,
    /// newest first.
    fn get_recent_decisions(&self, identity: &Identity, limit: usize)
        -> Result<Vec<DecisionRecord>>;

    /// Same as `get_recent_decisions`, restricted to one decision type.
    fn get_recent_decisions_of_type(
        &self,
        identity: &Identity,
        decision: Decision,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>>;

    /// Deletes every accept record of the identity for the given item.
    /// Returns the number of deleted records, 0 if there was nothing to delete.
    fn delete_accepted_item(&self, identity: &Identity, item_id: ItemId) -> Result<usize>;

    /// Returns all accept records of the identity, newest first.
    fn get_accepted_decisions(&self, identity: &Identity) -> Result<Vec<DecisionRecord>>;
}
