use super::error::DiscoveryError;
use super::taxonomy::ALL_GENRES;
use crate::interactions::{
    Decision, DisplayMetadata, GenreId, Identity, InteractionStore, ItemId, LikedItem,
    NewDecision,
};
use crate::server::metrics;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A swipe as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct SwipeInput {
    pub item_id: ItemId,
    /// Wire spelling, see `Decision::from_wire`.
    pub decision: String,
    pub genre_id: Option<GenreId>,
    pub metadata: DisplayMetadata,
}

/// Write path of the viewers' decisions and the liked items projection
/// built on top of them.
pub struct InteractionRecorder {
    store: Arc<dyn InteractionStore>,
}

impl InteractionRecorder {
    pub fn new(store: Arc<dyn InteractionStore>) -> Self {
        Self { store }
    }

    /// Appends one decision record, repeated swipes are all kept.
    pub fn record(
        &self,
        identity: Option<&Identity>,
        input: SwipeInput,
    ) -> Result<usize, DiscoveryError> {
        let identity = identity.ok_or(DiscoveryError::InvalidIdentity)?;
        let decision = Decision::from_wire(&input.decision)
            .ok_or_else(|| DiscoveryError::InvalidDecision(input.decision.clone()))?;

        let record_id = self.store.append_decision(NewDecision {
            identity: identity.clone(),
            item_id: input.item_id,
            decision,
            genre_id: input.genre_id.filter(|genre_id| *genre_id != ALL_GENRES),
            metadata: input.metadata.normalized(),
        })?;
        metrics::record_decision(decision.as_str());
        debug!(
            "Recorded {} of item {} as record {}",
            decision.as_str(),
            input.item_id,
            record_id
        );
        Ok(record_id)
    }

    /// Newest first, one entry per item, legacy records without display
    /// metadata are skipped. Without identity there is nothing to list.
    pub fn list_liked(&self, identity: Option<&Identity>) -> Result<Vec<LikedItem>, DiscoveryError> {
        let Some(identity) = identity else {
            return Ok(vec![]);
        };
        let mut seen: HashSet<ItemId> = HashSet::new();
        let liked = self
            .store
            .get_accepted_decisions(identity)?
            .iter()
            .filter_map(LikedItem::from_record)
            .filter(|item| seen.insert(item.id))
            .collect();
        Ok(liked)
    }

    /// Removing an item that was never liked is a no-op.
    pub fn remove_liked(
        &self,
        identity: Option<&Identity>,
        item_id: ItemId,
    ) -> Result<(), DiscoveryError> {
        let identity = identity.ok_or(DiscoveryError::InvalidIdentity)?;
        let deleted = self.store.delete_accepted_item(identity, item_id)?;
        debug!("Removed {} liked records of item {}", deleted, item_id);
        Ok(())
    }
}
