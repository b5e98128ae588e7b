use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{categories_repo, locations_repo};
use crate::error::{AppError, Result};
use crate::models::{Category, CityRow, StateRow, SubCategoryRow};

/// Entry of the location picker JSON endpoints.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LocationOption {
    pub id: i64,
    pub name: String,
}

pub async fn list_states(pool: &SqlitePool) -> Result<Vec<LocationOption>> {
    let rows = locations_repo::list_states(pool).await?;
    Ok(rows
        .into_iter()
        .map(|s| LocationOption {
            id: s.id,
            name: s.name.unwrap_or_default(),
        })
        .collect())
}

pub async fn list_cities(pool: &SqlitePool, state_id: i64) -> Result<Vec<LocationOption>> {
    let rows = locations_repo::list_cities_for_state(pool, state_id).await?;
    Ok(rows
        .into_iter()
        .map(|c| LocationOption {
            id: c.id,
            name: c.name.unwrap_or_default(),
        })
        .collect())
}

/// Seed file consumed by the `seed_locations` binary.
#[derive(Debug, Deserialize, Default)]
pub struct SeedFile {
    #[serde(default)]
    pub states: Vec<SeedState>,
    #[serde(default)]
    pub sub_categories: Vec<SeedSubCategory>,
}

#[derive(Debug, Deserialize)]
pub struct SeedState {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub cities: Vec<SeedCity>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCity {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedSubCategory {
    pub id: i64,
    /// Category tag, e.g. `inmuebles`.
    pub category: String,
    pub name: String,
    pub tag: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub states: usize,
    pub cities: usize,
    pub sub_categories: usize,
    pub skipped: usize,
}

pub fn parse_seed(raw: &str) -> Result<SeedFile> {
    Ok(serde_json::from_str(raw)?)
}

/// Upserts every row of the seed file; running it twice changes nothing.
pub async fn apply_seed(pool: &SqlitePool, seed: &SeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for state in &seed.states {
        locations_repo::upsert_state(
            pool,
            &StateRow {
                id: state.id,
                name: Some(state.name.clone()),
            },
        )
        .await?;
        report.states += 1;

        for city in &state.cities {
            locations_repo::upsert_city(
                pool,
                &CityRow {
                    id: city.id,
                    name: Some(city.name.clone()),
                    state_id: Some(state.id),
                },
            )
            .await?;
            report.cities += 1;
        }
    }

    for sub in &seed.sub_categories {
        let Some(category) = Category::by_tag(&sub.category) else {
            warn!("🌱 Unknown category '{}' for sub-category {}", sub.category, sub.name);
            report.skipped += 1;
            continue;
        };
        categories_repo::upsert_sub_category(
            pool,
            &SubCategoryRow {
                id: sub.id,
                category_id: category.id,
                name: Some(sub.name.clone()),
                tag: sub.tag.clone(),
            },
        )
        .await?;
        report.sub_categories += 1;
    }

    info!(
        "🌱 Seeded {} states, {} cities, {} sub-categories ({} skipped)",
        report.states, report.cities, report.sub_categories, report.skipped
    );
    Ok(report)
}

pub async fn seed_from_path(pool: &SqlitePool, path: &std::path::Path) -> Result<SeedReport> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::config(format!("cannot read seed file {}: {}", path.display(), e))
    })?;
    apply_seed(pool, &parse_seed(&raw)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::test_pool;

    const SEED: &str = r#"{
        "states": [
            {"id": 5, "name": "Zulia", "cities": [{"id": 12, "name": "Maracaibo"}, {"id": 14, "name": "Cabimas"}]},
            {"id": 6, "name": "Lara", "cities": [{"id": 13, "name": "Barquisimeto"}]}
        ],
        "sub_categories": [
            {"id": 1, "category": "inmuebles", "name": "Casa", "tag": "casa"},
            {"id": 2, "category": "vehiculos", "name": "Carro"},
            {"id": 3, "category": "barcos", "name": "Yate"}
        ]
    }"#;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let pool = test_pool().await;
        let seed = parse_seed(SEED).unwrap();

        let first = apply_seed(&pool, &seed).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                states: 2,
                cities: 3,
                sub_categories: 2,
                skipped: 1
            }
        );
        apply_seed(&pool, &seed).await.unwrap();

        let states = list_states(&pool).await.unwrap();
        let names: Vec<&str> = states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Lara", "Zulia"]);

        let cities = list_cities(&pool, 5).await.unwrap();
        assert_eq!(
            cities,
            vec![
                LocationOption {
                    id: 14,
                    name: "Cabimas".into()
                },
                LocationOption {
                    id: 12,
                    name: "Maracaibo".into()
                },
            ]
        );

        let subs = categories_repo::list_sub_categories(&pool, 1).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name.as_deref(), Some("Casa"));
    }

    #[test]
    fn malformed_seed_is_a_json_error() {
        assert!(matches!(parse_seed("{"), Err(AppError::Json(_))));
    }
}
