//! Dashboard recommendation widgets assembled from the catalog.

use std::time::Duration;

use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{catalog::CatalogTable, discipline::Discipline, intake_profile::IntakeProfile},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    catalog_query::{
        CatalogItem, CatalogQuery, CatalogQueryError, FilterValue, SortDirection, fetch_items,
        resolve_table,
    },
    normalized_profile::NormalizedProfile,
    price::price_value,
    recommendation_cache::{CacheKey, RecommendationCache},
};

pub const DEFAULT_LIMIT: u32 = 3;
const MAX_SPECS: usize = 4;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("profile not found: {0}")]
    ProfileNotFound(Uuid),
    #[error("stored profile {0} could not be decoded")]
    InvalidProfile(Uuid),
    #[error(transparent)]
    Catalog(#[from] CatalogQueryError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SpecEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RecommendationWidget {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub specs: Vec<SpecEntry>,
    pub justification: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RecommendationSet {
    pub discipline: Discipline,
    pub items: Vec<RecommendationWidget>,
    pub cached: bool,
    pub generated_at: DateTime<Utc>,
}

/// How a discipline with a catalog table is ranked and summarized.
struct Ranking {
    sort_by: &'static str,
    specs: &'static [(&'static str, &'static str)],
}

fn ranking(discipline: Discipline) -> Option<Ranking> {
    let ranking = match discipline {
        Discipline::HeatPump => Ranking {
            sort_by: "scop",
            specs: &[
                ("pump_type", "Type"),
                ("power_kw", "Power (kW)"),
                ("scop", "SCOP"),
                ("noise_db", "Noise (dB)"),
                ("energy_label", "Energy label"),
            ],
        },
        Discipline::Solar => Ranking {
            sort_by: "efficiency",
            specs: &[
                ("wattage_wp", "Peak power (Wp)"),
                ("efficiency", "Efficiency (%)"),
                ("panel_type", "Cell type"),
                ("warranty_years", "Warranty (years)"),
            ],
        },
        Discipline::Battery => Ranking {
            sort_by: "capacity_kwh",
            specs: &[
                ("capacity_kwh", "Capacity (kWh)"),
                ("power_kw", "Power (kW)"),
                ("chemistry", "Chemistry"),
                ("cycles", "Cycles"),
            ],
        },
        Discipline::AirConditioning => Ranking {
            sort_by: "seer",
            specs: &[
                ("unit_type", "Type"),
                ("cooling_kw", "Cooling (kW)"),
                ("seer", "SEER"),
                ("noise_db", "Noise (dB)"),
            ],
        },
        Discipline::Insulation | Discipline::HeatDistribution => return None,
    };
    Some(ranking)
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn text_field(item: &CatalogItem, field: &str) -> Option<String> {
    item.get(field).and_then(display)
}

fn justification(discipline: Discipline, item: &CatalogItem, profile: &NormalizedProfile) -> String {
    let value = |field| text_field(item, field).unwrap_or_else(|| "-".to_string());
    let budget = profile.budget.max.round() as i64;
    match discipline {
        Discipline::HeatPump => format!(
            "SCOP of {} puts it among the most efficient heat pumps within your budget of up to €{budget}.",
            value("scop")
        ),
        Discipline::Solar => format!(
            "{}% panel efficiency gets the most out of your roof area.",
            value("efficiency")
        ),
        Discipline::Battery => format!(
            "{} kWh of storage to keep more of your own solar power.",
            value("capacity_kwh")
        ),
        Discipline::AirConditioning => format!(
            "SEER {} keeps cooling costs low within your budget of up to €{budget}.",
            value("seer")
        ),
        Discipline::Insulation | Discipline::HeatDistribution => String::new(),
    }
}

/// Map a catalog row onto a widget summary.
pub fn widget_from_item(
    discipline: Discipline,
    table: &CatalogTable,
    item: &CatalogItem,
    profile: &NormalizedProfile,
) -> RecommendationWidget {
    let brand = text_field(item, "brand");
    let model = text_field(item, "model");
    let title = [brand.as_deref(), model.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let specs = ranking(discipline)
        .map(|r| {
            r.specs
                .iter()
                .filter_map(|(field, label)| {
                    text_field(item, field).map(|value| SpecEntry {
                        label: label.to_string(),
                        value,
                    })
                })
                .take(MAX_SPECS)
                .collect()
        })
        .unwrap_or_default();

    let id = item
        .get(CatalogTable::ID_COLUMN)
        .and_then(display)
        .unwrap_or_default();

    RecommendationWidget {
        id: format!("{}-{id}", table.name),
        title,
        description: text_field(item, "description"),
        image_url: text_field(item, "image_url"),
        price: item.get("price").and_then(price_value),
        specs,
        justification: justification(discipline, item, profile),
        link: brand.map(|b| format!("/catalog/{}?brand={}", table.name, urlencode(&b))),
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn canned(id: &str, title: &str, description: &str, justification: &str) -> RecommendationWidget {
    RecommendationWidget {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        image_url: None,
        price: None,
        specs: Vec::new(),
        justification: justification.to_string(),
        link: None,
    }
}

/// Fixed advice for disciplines without a product table.
pub fn static_recommendations(discipline: Discipline) -> Vec<RecommendationWidget> {
    match discipline {
        Discipline::Insulation => vec![
            canned(
                "isolatie-roof",
                "Roof insulation",
                "Insulate the roof from the inside with mineral wool or PIR boards.",
                "Most heat escapes through the roof, so this usually pays back first.",
            ),
            canned(
                "isolatie-cavity-wall",
                "Cavity wall insulation",
                "Fill the cavity wall with EPS beads or mineral wool flakes.",
                "A one-day job with a short payback period for houses built before 1975.",
            ),
            canned(
                "isolatie-hr-glazing",
                "HR++ glazing",
                "Replace single or double glazing with HR++ or triple glazing.",
                "Cuts draught and cold spots near windows.",
            ),
        ],
        Discipline::HeatDistribution => vec![
            canned(
                "afgifte-low-temperature-radiators",
                "Low-temperature radiators",
                "Swap the largest radiators for low-temperature models.",
                "Lets a heat pump run at lower flow temperatures with a higher SCOP.",
            ),
            canned(
                "afgifte-floor-heating",
                "Floor heating",
                "Install floor heating on the ground floor during a renovation.",
                "The large surface heats evenly at 30 to 35 °C.",
            ),
            canned(
                "afgifte-hydronic-balancing",
                "Hydronic balancing",
                "Balance the heating system so every room gets the right flow.",
                "An inexpensive step that improves comfort straight away.",
            ),
        ],
        _ => Vec::new(),
    }
}

/// Query the discipline's table for the best-ranked items within budget.
pub async fn assemble(
    db: &DBService,
    discipline: Discipline,
    profile: &NormalizedProfile,
    limit: u32,
) -> Result<Vec<RecommendationWidget>, RecommendationError> {
    let (Some(table_name), Some(ranking)) = (discipline.catalog_table(), ranking(discipline)) else {
        return Ok(static_recommendations(discipline));
    };
    let table = resolve_table(table_name)?;

    let mut query = CatalogQuery {
        limit,
        sort_by: Some(ranking.sort_by.to_string()),
        sort_dir: SortDirection::Desc,
        ..Default::default()
    };
    query
        .filters
        .insert("price_max".to_string(), FilterValue::Number(profile.budget.max));

    let items = fetch_items(&db.pool, table, &query).await?;
    debug!(discipline = %discipline, count = items.len(), "Recommendation candidates fetched");

    Ok(items
        .iter()
        .map(|item| widget_from_item(discipline, table, item, profile))
        .collect())
}

/// Recommendation assembly with a per-profile TTL cache in front of it.
pub struct RecommendationService {
    cache: RecommendationCache<Vec<RecommendationWidget>>,
    limit: u32,
}

impl RecommendationService {
    pub fn new(ttl: Duration, limit: u32) -> Self {
        Self::with_cache(RecommendationCache::new(ttl), limit)
    }

    pub fn with_cache(cache: RecommendationCache<Vec<RecommendationWidget>>, limit: u32) -> Self {
        Self {
            cache,
            limit: limit.max(1),
        }
    }

    pub fn cache(&self) -> &RecommendationCache<Vec<RecommendationWidget>> {
        &self.cache
    }

    /// Widgets for a stored profile. `refresh` skips the cache and replaces the
    /// cached entry.
    pub async fn recommend(
        &self,
        db: &DBService,
        discipline: Discipline,
        profile_id: Uuid,
        refresh: bool,
    ) -> Result<RecommendationSet, RecommendationError> {
        let stored = IntakeProfile::find_by_id(&db.pool, profile_id)
            .await?
            .ok_or(RecommendationError::ProfileNotFound(profile_id))?;
        let profile: NormalizedProfile = stored
            .parsed_profile()
            .ok_or(RecommendationError::InvalidProfile(profile_id))?;

        let key = CacheKey {
            discipline,
            profile_id,
            profile_updated_at: stored.updated_at,
        };
        if !refresh {
            if let Some(items) = self.cache.get(&key) {
                debug!(discipline = %discipline, profile_id = %profile_id, "Recommendation cache hit");
                return Ok(RecommendationSet {
                    discipline,
                    items,
                    cached: true,
                    generated_at: Utc::now(),
                });
            }
        }

        let items = assemble(db, discipline, &profile, self.limit).await?;
        info!(
            discipline = %discipline,
            profile_id = %profile_id,
            count = items.len(),
            refresh,
            "Recommendations assembled"
        );
        self.cache.insert(key, items.clone());

        Ok(RecommendationSet {
            discipline,
            items,
            cached: false,
            generated_at: Utc::now(),
        })
    }
}
