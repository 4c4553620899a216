//! Which cache entries a successful mutation makes stale.

use crate::cache::{CacheStore, EntityKind, KeyPattern};

/// A mutating operation, as far as invalidation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Rating changes the movie's average and the user's library, and feeds
    /// the recommender.
    RateMovie { movie_id: u64 },
    /// Recording a view adds the movie to the library.
    RecordView { movie_id: u64 },
    RemoveFromLibrary { movie_id: u64 },
    UpdatePreferences,
    UpdateProfile,
    CreateMovie,
    TrainRecommender,
    /// Caller-supplied patterns for operations outside the table.
    Custom(Vec<KeyPattern>),
}

/// Patterns to purge once `mutation` has succeeded.
pub fn rules_for(mutation: &MutationKind) -> Vec<KeyPattern> {
    use EntityKind::*;

    match mutation {
        MutationKind::RateMovie { movie_id } => vec![
            KeyPattern::Item(Movie, *movie_id),
            KeyPattern::Entity(Library),
            KeyPattern::Entity(Recommendations),
        ],
        MutationKind::RecordView { movie_id } => vec![
            KeyPattern::Item(Movie, *movie_id),
            KeyPattern::Entity(Library),
        ],
        MutationKind::RemoveFromLibrary { .. } => vec![KeyPattern::Entity(Library)],
        MutationKind::UpdatePreferences | MutationKind::TrainRecommender => {
            vec![KeyPattern::Entity(Recommendations)]
        }
        MutationKind::UpdateProfile => vec![KeyPattern::Entity(CurrentUser)],
        MutationKind::CreateMovie => vec![
            KeyPattern::Entity(MovieList),
            KeyPattern::Entity(Search),
            KeyPattern::Entity(Trending),
        ],
        MutationKind::Custom(patterns) => patterns.clone(),
    }
}

/// Purge every entry matched by the rules for `mutation`.
///
/// Only call this after the mutation was confirmed by the backend.
pub fn apply(store: &CacheStore, mutation: &MutationKind) -> usize {
    let patterns = rules_for(mutation);
    let removed = store.invalidate(|key| patterns.iter().any(|pattern| pattern.matches(key)));
    tracing::debug!(?mutation, removed, "Invalidated cache entries");
    removed
}
