use crate::common::{init_test_env, memory_engine};
use skillboard_processor::{
    database::{
        memory::MemoryStore,
        store::{Timeline, TimelineStore}
    },
    error::{Error, InvariantViolation, ModelError},
    model::{
        engine::RatingEngine,
        rating_model::{RatedTeam, RatingModel},
        structures::{
            board::{BoardParams, ParticipantId},
            rating::Rating
        }
    },
    utils::test_utils::{generate_head_to_head, posterior_snapshot, seed_board, timestamp}
};
use std::collections::HashMap;

struct FailingModel;

impl RatingModel for FailingModel {
    fn rate(&self, teams: &[RatedTeam], _: &BoardParams) -> Result<HashMap<ParticipantId, Rating>, ModelError> {
        Err(ModelError::ShapeMismatch {
            expected: teams.len(),
            actual: 0
        })
    }
}

/// Returns a rating for every participant but the first.
struct ForgetfulModel;

impl RatingModel for ForgetfulModel {
    fn rate(&self, teams: &[RatedTeam], _: &BoardParams) -> Result<HashMap<ParticipantId, Rating>, ModelError> {
        Ok(teams
            .iter()
            .flat_map(|t| t.players.iter())
            .skip(1)
            .map(|(id, player)| (*id, player.prior))
            .collect())
    }
}

#[tokio::test]
async fn test_clean_game_with_null_posterior_is_reported() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let game = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();

    let mut tx = engine.store().begin().await.unwrap();
    tx.mark_clean(&[game]).await.unwrap();
    tx.commit().await.unwrap();

    let result = engine.recalculate(game).await;

    assert!(matches!(
        result,
        Err(Error::Invariant(InvariantViolation::NullPosterior { game: g, .. })) if g == game
    ));
}

#[tokio::test]
async fn test_null_prior_in_clean_ancestor_is_reported() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let first = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let second = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();

    let mut tx = engine.store().begin().await.unwrap();
    tx.mark_clean(&[first]).await.unwrap();
    tx.commit().await.unwrap();

    let result = engine.recalculate(second).await;

    assert!(matches!(
        result,
        Err(Error::Invariant(InvariantViolation::NullPosterior { game: g, .. })) if g == first
    ));
    assert!(engine.game(second).await.unwrap().dirty);
}

#[tokio::test]
async fn test_foreign_participant_is_reported() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 1).await;
    let (_, outsiders) = seed_board(&engine, "other", 1).await;

    // Bypasses mutation validation to simulate corrupted data
    let mut tx = engine.store().begin().await.unwrap();
    let game = tx
        .insert_game(board, &generate_head_to_head(p[0], outsiders[0], timestamp(0)))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let result = engine.recalculate(game).await;

    assert!(matches!(
        result,
        Err(Error::Invariant(InvariantViolation::ForeignParticipant { participant, .. })) if participant == outsiders[0]
    ));
    assert!(matches!(engine.replay(board).await, Err(Error::Invariant(_))));
}

#[tokio::test]
async fn test_model_failure_commits_nothing() {
    init_test_env();
    let engine = RatingEngine::new(MemoryStore::new(), FailingModel);
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let game = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let before = posterior_snapshot(&engine, board).await;

    assert!(matches!(engine.recalculate(game).await, Err(Error::Model(_))));
    assert!(matches!(engine.replay(board).await, Err(Error::Model(_))));

    assert!(engine.game(game).await.unwrap().dirty);
    assert_eq!(posterior_snapshot(&engine, board).await, before);
}

#[tokio::test]
async fn test_missing_rating_is_a_model_error() {
    init_test_env();
    let engine = RatingEngine::new(MemoryStore::new(), ForgetfulModel);
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let game = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();

    let result = engine.recalculate(game).await;

    assert!(matches!(
        result,
        Err(Error::Model(ModelError::MissingParticipant(id))) if id == p[0]
    ));
    assert!(engine.game(game).await.unwrap().dirty);
}
