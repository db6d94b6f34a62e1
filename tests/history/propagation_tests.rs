use crate::common::memory_engine;
use skillboard_processor::{
    database::store::{Timeline, TimelineStore},
    model::structures::{
        board::BoardParams,
        game::GameEdit,
        outcome::RecalcOutcome
    },
    utils::test_utils::{generate_game, generate_head_to_head, posterior_snapshot, seed_board, timestamp}
};

#[tokio::test]
async fn test_insert_dirties_only_next_game() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 3).await;
    let g1 = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    let g2 = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(2)))
        .await
        .unwrap();
    let g3 = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(3)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();

    let g0 = engine
        .create_game(board, generate_head_to_head(p[0], p[2], timestamp(0)))
        .await
        .unwrap();
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![g0, g1]);

    assert_eq!(
        engine.recalculate(g0).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 2,
            dirtied: vec![g1]
        }
    );
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![g1]);

    assert_eq!(
        engine.recalculate(g1).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 2,
            dirtied: vec![g2]
        }
    );
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![g2]);

    engine.settle_board(board, None).await.unwrap();
    assert!(!engine.game(g3).await.unwrap().dirty);
}

#[tokio::test]
async fn test_insert_between_games() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 3).await;
    let early = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let late = engine
        .create_game(board, generate_head_to_head(p[1], p[2], timestamp(10)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();

    let middle = engine
        .create_game(board, generate_head_to_head(p[0], p[2], timestamp(5)))
        .await
        .unwrap();

    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![middle, late]);
    assert!(!engine.game(early).await.unwrap().dirty);
}

#[tokio::test]
async fn test_delete_dirties_each_participants_next_game() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 4).await;
    let removed = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let next_p0 = engine
        .create_game(board, generate_head_to_head(p[0], p[2], timestamp(1)))
        .await
        .unwrap();
    let next_p1 = engine
        .create_game(board, generate_head_to_head(p[3], p[1], timestamp(2)))
        .await
        .unwrap();
    let unrelated = engine
        .create_game(board, generate_head_to_head(p[2], p[3], timestamp(3)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();

    let dirtied = engine.delete_game(removed).await.unwrap();

    assert_eq!(dirtied, vec![next_p0, next_p1]);
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![next_p0, next_p1]);
    assert!(!engine.game(unrelated).await.unwrap().dirty);
}

#[tokio::test]
async fn test_unchanged_posteriors_stop_propagation() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let first = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let second = engine
        .create_game(board, generate_head_to_head(p[1], p[0], timestamp(1)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();
    let before = posterior_snapshot(&engine, board).await;

    let dirtied = engine
        .edit_game(
            first,
            GameEdit::SetWeight {
                participant_id: p[0],
                weight: 1.0
            }
        )
        .await
        .unwrap();
    assert_eq!(dirtied, vec![first]);

    assert_eq!(
        engine.recalculate(first).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 0,
            dirtied: vec![]
        }
    );
    assert!(!engine.game(second).await.unwrap().dirty);
    assert_eq!(posterior_snapshot(&engine, board).await, before);
}

#[tokio::test]
async fn test_weight_change_propagates_through_recalculation() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let first = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let second = engine
        .create_game(board, generate_head_to_head(p[1], p[0], timestamp(1)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();

    engine
        .edit_game(
            first,
            GameEdit::SetWeight {
                participant_id: p[0],
                weight: 0.25
            }
        )
        .await
        .unwrap();
    assert!(!engine.game(second).await.unwrap().dirty);

    assert_eq!(
        engine.recalculate(first).await.unwrap(),
        RecalcOutcome::Recalculated {
            updated: 1,
            dirtied: vec![second]
        }
    );
}

#[tokio::test]
async fn test_adding_member_dirties_their_next_game() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 4).await;
    let edited = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let p2_next = engine
        .create_game(board, generate_head_to_head(p[2], p[3], timestamp(5)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();
    let team = engine.game(edited).await.unwrap().teams[0].id;

    let dirtied = engine
        .edit_game(
            edited,
            GameEdit::AddMember {
                team_id: team,
                participant_id: p[2],
                weight: 1.0
            }
        )
        .await
        .unwrap();

    assert_eq!(dirtied, vec![edited, p2_next]);
    assert_eq!(engine.game(edited).await.unwrap().teams[0].members.len(), 2);

    let dirtied = engine
        .edit_game(edited, GameEdit::RemoveMember { participant_id: p[2] })
        .await
        .unwrap();
    assert_eq!(dirtied, vec![edited, p2_next]);
}

#[tokio::test]
async fn test_reschedule_dirties_both_positions() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let moved = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();
    let old_next = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(1)))
        .await
        .unwrap();
    let new_next = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(3)))
        .await
        .unwrap();
    engine.settle_board(board, None).await.unwrap();

    let dirtied = engine.reschedule_game(moved, timestamp(2)).await.unwrap();

    let mut expected = vec![moved, old_next, new_next];
    expected.sort();
    assert_eq!(dirtied, expected);
    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![old_next, moved, new_next]);
}

#[tokio::test]
async fn test_tunable_change_dirties_every_game() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 3).await;
    for day in 0..4 {
        engine
            .create_game(
                board,
                generate_game(timestamp(day), vec![(0, vec![p[0]]), (1, vec![p[1]]), (2, vec![p[2]])])
            )
            .await
            .unwrap();
    }
    engine.settle_board(board, None).await.unwrap();
    let before = posterior_snapshot(&engine, board).await;

    let dirtied = engine
        .update_board_params(
            board,
            BoardParams {
                tau: 0.5,
                ..Default::default()
            }
        )
        .await
        .unwrap();
    assert_eq!(dirtied, 4);

    let summary = engine.settle_board(board, None).await.unwrap();
    assert!(summary.is_settled());
    assert_ne!(posterior_snapshot(&engine, board).await, before);
}

#[tokio::test]
async fn test_concurrent_dirtying_is_idempotent() {
    let engine = memory_engine();
    let (board, p) = seed_board(&engine, "pool", 2).await;
    let game = engine
        .create_game(board, generate_head_to_head(p[0], p[1], timestamp(0)))
        .await
        .unwrap();

    for _ in 0..2 {
        let mut tx = engine.store().begin().await.unwrap();
        tx.mark_dirty(&[game, game]).await.unwrap();
        tx.commit().await.unwrap();
    }

    assert_eq!(engine.dirty_games(board).await.unwrap(), vec![game]);
}
