use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::db::models::{DraftPickRow, NewPick};
use crate::error::{AppError, Result};

/// Server-side draft list. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct DraftBoard {
    pool: sqlx::SqlitePool,
}

impl DraftBoard {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Records a pick. A player can only be drafted once.
    pub async fn record_pick(&self, pick: &NewPick) -> Result<DraftPickRow> {
        let player_id = pick.player_id.trim();
        if player_id.is_empty() {
            return Err(AppError::BadRequest("player_id is required".to_string()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO draft_picks (player_id, full_name, position, team, picked_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(player_id) DO NOTHING
            "#,
        )
        .bind(player_id)
        .bind(&pick.full_name)
        .bind(&pick.position)
        .bind(&pick.team)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "player {player_id} has already been drafted"
            )));
        }

        let row = sqlx::query_as::<_, DraftPickRow>(
            "SELECT id, player_id, full_name, position, team, picked_at FROM draft_picks WHERE player_id = ?",
        )
        .bind(player_id)
        .fetch_one(&self.pool)
        .await?;

        info!(player_id = %row.player_id, pick = row.id, "Draft pick recorded");
        Ok(row)
    }

    /// Every pick, in pick order.
    pub async fn picks(&self) -> Result<Vec<DraftPickRow>> {
        let rows = sqlx::query_as::<_, DraftPickRow>(
            "SELECT id, player_id, full_name, position, team, picked_at FROM draft_picks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn drafted_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT player_id FROM draft_picks")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    pub async fn remove_pick(&self, player_id: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM draft_picks WHERE player_id = ?")
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "player {player_id} is not on the draft board"
            )));
        }
        info!(player_id = %player_id, "Draft pick removed");
        Ok(())
    }

    /// Removes and returns the most recent pick.
    pub async fn undo_last(&self) -> Result<DraftPickRow> {
        let last = sqlx::query_as::<_, DraftPickRow>(
            "SELECT id, player_id, full_name, position, team, picked_at FROM draft_picks ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("draft board is empty".to_string()))?;

        sqlx::query("DELETE FROM draft_picks WHERE id = ?")
            .bind(last.id)
            .execute(&self.pool)
            .await?;
        info!(player_id = %last.player_id, pick = last.id, "Draft pick undone");
        Ok(last)
    }

    /// Clears the board. Returns how many picks were removed.
    pub async fn reset(&self) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM draft_picks")
            .execute(&self.pool)
            .await?;
        info!(removed = deleted.rows_affected(), "Draft board reset");
        Ok(deleted.rows_affected())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    pub(crate) async fn memory_board() -> DraftBoard {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        DraftBoard::new(pool)
    }

    fn pick(id: &str) -> NewPick {
        NewPick {
            player_id: id.to_string(),
            full_name: Some(format!("Player {id}")),
            position: Some("RB".to_string()),
            team: None,
        }
    }

    #[tokio::test]
    async fn picks_come_back_in_pick_order() {
        let board = memory_board().await;
        board.record_pick(&pick("9")).await.unwrap();
        board.record_pick(&pick("3")).await.unwrap();
        board.record_pick(&pick("5")).await.unwrap();

        let ids: Vec<String> = board
            .picks()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        assert_eq!(ids, vec!["9", "3", "5"]);
        assert_eq!(board.drafted_ids().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_pick_conflicts() {
        let board = memory_board().await;
        board.record_pick(&pick("7")).await.unwrap();
        let err = board.record_pick(&pick("7")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(board.picks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_player_id_is_rejected() {
        let board = memory_board().await;
        let err = board.record_pick(&pick("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn undo_removes_latest_then_reports_empty() {
        let board = memory_board().await;
        board.record_pick(&pick("1")).await.unwrap();
        board.record_pick(&pick("2")).await.unwrap();

        assert_eq!(board.undo_last().await.unwrap().player_id, "2");
        assert_eq!(board.undo_last().await.unwrap().player_id, "1");
        assert!(matches!(board.undo_last().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_and_reset() {
        let board = memory_board().await;
        board.record_pick(&pick("1")).await.unwrap();
        board.record_pick(&pick("2")).await.unwrap();

        board.remove_pick("1").await.unwrap();
        assert!(matches!(board.remove_pick("1").await, Err(AppError::NotFound(_))));

        // removed players can be drafted again
        board.record_pick(&pick("1")).await.unwrap();
        assert_eq!(board.reset().await.unwrap(), 2);
        assert!(board.picks().await.unwrap().is_empty());
    }
}
