use crate::common::memory_engine;
use indexmap::IndexMap;
use skillboard_processor::{
    model::{
        rating_model::{PlackettLuceModel, RatedPlayer, RatedTeam, RatingModel},
        structures::{
            board::{BoardParams, ParticipantId},
            outcome::RecalcOutcome,
            rating::Rating
        }
    },
    utils::test_utils::{generate_head_to_head, seed_board, timestamp}
};
use std::collections::HashMap;

fn rate_head_to_head(
    winner: (ParticipantId, Rating),
    loser: (ParticipantId, Rating)
) -> HashMap<ParticipantId, Rating> {
    let team = |rank: u32, (id, prior): (ParticipantId, Rating)| RatedTeam {
        rank,
        players: IndexMap::from([(id, RatedPlayer { prior, weight: 1.0 })])
    };

    PlackettLuceModel::default()
        .rate(&[team(0, winner), team(1, loser)], &BoardParams::default())
        .unwrap()
}

#[tokio::test]
async fn test_insert_before_existing_game() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let default_prior = BoardParams::default().default_rating();

    let a = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    engine.recalculate(a).await.unwrap();

    let original = engine.game(a).await.unwrap();
    let expected = rate_head_to_head((p[0], default_prior), (p[1], default_prior));
    assert_eq!(original.membership_of(p[0]).unwrap().posterior, Some(expected[&p[0]]));
    assert_eq!(original.membership_of(p[1]).unwrap().posterior, Some(expected[&p[1]]));

    let b = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![b, a]);

    assert_eq!(engine.recalculate(a).await.unwrap(), RecalcOutcome::NotReady { blocked_by: b });
    assert_eq!(
        engine.recalculate(b).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 2,
            dirtied: vec![a]
        }
    );

    let b_game = engine.game(b).await.unwrap();
    let b0 = b_game.membership_of(p[0]).unwrap().posterior.unwrap();
    let b1 = b_game.membership_of(p[1]).unwrap().posterior.unwrap();
    assert_eq!(b0, expected[&p[0]]);
    assert_eq!(b1, expected[&p[1]]);

    assert_eq!(
        engine.recalculate(a).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 2,
            dirtied: vec![]
        }
    );

    let updated = engine.game(a).await.unwrap();
    let chained = rate_head_to_head((p[0], b0), (p[1], b1));
    assert!(!updated.dirty);
    assert_eq!(updated.membership_of(p[0]).unwrap().posterior, Some(chained[&p[0]]));
    assert_ne!(updated.membership_of(p[0]).unwrap().posterior, original.membership_of(p[0]).unwrap().posterior);
    assert!(engine.dirty_games(board).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_restores_original_result() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;

    let a = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();
    let original = engine.game(a).await.unwrap();

    let b = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();
    assert_ne!(engine.game(a).await.unwrap(), original);

    let dirtied = engine.delete_game(b).await.unwrap();
    assert_eq!(dirtied, vec![a]);
    assert!(engine.game(a).await.unwrap().dirty);

    assert_eq!(
        engine.recalculate(a).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 2,
            dirtied: vec![]
        }
    );
    assert_eq!(engine.game(a).await.unwrap(), original);
}

#[tokio::test]
async fn test_recalculate_clean_game_is_noop() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let a = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    engine.recalculate(a).await.unwrap();
    let before = engine.game(a).await.unwrap();

    for _ in 0..3 {
        assert_eq!(engine.recalculate(a).await.unwrap(), RecalcOutcome::AlreadyClean);
    }

    assert_eq!(engine.game(a).await.unwrap(), before);
}

#[tokio::test]
async fn test_not_ready_changes_nothing() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 3).await;
    let first = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    let second = engine
        .create_game(board, generate_head_to_head(p[2], p[1], timestamp(2)))
        .await
        .unwrap();
    let before = engine.game(second).await.unwrap();

    let outcome = engine.recalculate(second).await.unwrap();

    assert_eq!(outcome, RecalcOutcome::NotReady { blocked_by: first });
    assert_eq!(engine.game(second).await.unwrap(), before);
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![first, second]);
}

#[tokio::test]
async fn test_missing_game_is_not_found() {
    let engine = memory_engine();

    let result = engine.recalculate(404).await;

    assert!(matches!(
        result,
        Err(skillboard_processor::error::Error::NotFound { entity: "game", id: 404 })
    ));
}
