use serde::{Deserialize, Serialize};

/// Row type for the `draft_picks` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DraftPickRow {
    /// Autoincrement id. Ascending id is pick order.
    pub id: i64,
    pub player_id: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub team: Option<String>,
    /// Unix ms.
    pub picked_at: i64,
}

/// Body of `POST /draft/picks`. Only `player_id` is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPick {
    pub player_id: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub team: Option<String>,
}
