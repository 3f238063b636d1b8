mod interaction_store;
mod models;

pub use interaction_store::InteractionStore;
pub use models::{
    Decision, DecisionRecord, DisplayMetadata, GenreId, Identity, ItemId, LikedItem, NewDecision,
    UNKNOWN_ARTIST,
};
