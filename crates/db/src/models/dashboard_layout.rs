use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

#[derive(Debug, Clone, FromRow)]
struct DashboardLayoutRow {
    user_id: String,
    widget_order: String,
    visible_widgets: String,
    updated_at: DateTime<Utc>,
}

/// Per-user ordering and visibility of dashboard widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct DashboardLayout {
    pub user_id: String,
    pub widget_order: Vec<String>,
    pub visible_widgets: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DashboardLayoutRow> for DashboardLayout {
    fn from(row: DashboardLayoutRow) -> Self {
        Self {
            user_id: row.user_id,
            widget_order: serde_json::from_str(&row.widget_order).unwrap_or_default(),
            visible_widgets: serde_json::from_str(&row.visible_widgets).unwrap_or_default(),
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SaveDashboardLayout {
    pub user_id: String,
    pub widget_order: Vec<String>,
    pub visible_widgets: Vec<String>,
}

impl DashboardLayout {
    pub const DEFAULT_WIDGETS: [&'static str; 6] = [
        "profile-summary",
        "recommendations-wp",
        "recommendations-pv",
        "recommendations-battery",
        "recommendations-isolatie",
        "recommendations-ac",
    ];

    /// Layout used when a user has never saved one.
    pub fn default_for(user_id: &str) -> Self {
        let widgets: Vec<String> = Self::DEFAULT_WIDGETS.iter().map(|w| w.to_string()).collect();
        Self {
            user_id: user_id.to_string(),
            widget_order: widgets.clone(),
            visible_widgets: widgets,
            updated_at: None,
        }
    }

    pub async fn find(pool: &SqlitePool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, DashboardLayoutRow>(
            r#"SELECT user_id, widget_order, visible_widgets, updated_at
            FROM dashboard_layouts
            WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn upsert(pool: &SqlitePool, data: &SaveDashboardLayout) -> Result<Self, sqlx::Error> {
        let widget_order = serde_json::to_string(&data.widget_order)
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let visible_widgets = serde_json::to_string(&data.visible_widgets)
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let row = sqlx::query_as::<_, DashboardLayoutRow>(
            r#"INSERT INTO dashboard_layouts (user_id, widget_order, visible_widgets, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(user_id) DO UPDATE SET
                widget_order = excluded.widget_order,
                visible_widgets = excluded.visible_widgets,
                updated_at = excluded.updated_at
            RETURNING user_id, widget_order, visible_widgets, updated_at"#,
        )
        .bind(&data.user_id)
        .bind(widget_order)
        .bind(visible_widgets)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(row.into())
    }
}
