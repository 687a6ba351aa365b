//! Batch import of one main dish and its side dishes
//!
//! Stages, awaited in order:
//! 1. Validate the whole payload; nothing is written if any field is rejected.
//! 2. Upsert the main dish and every side dish in one transaction.
//! 3. Re-read the ids of those dishes (an upsert may have hit an existing row).
//! 4. Upsert pairing edges and recipes in a second transaction. A side dish
//!    whose id could not be resolved is skipped.
//! 5. Invalidate cached reads touched by the import.
//!
//! Once stage 2 commits it stays committed; a later failure reports the
//! import as failed but the cache is still invalidated.

use crate::error::{ApiError, FieldError};
use crate::repository::{timestamp_now, upsert, DishRepository};
use crate::slug::strip_prefix_keeping_term;
use pairing_common::db::{Difficulty, DishType, NewDish, NewRecipe, Nutrition};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const MAX_NAME_CHARS: usize = 200;
const MAX_SLUG_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 2000;
const MAX_SEO_TITLE_CHARS: usize = 200;
const MAX_SEO_DESCRIPTION_CHARS: usize = 500;
const MAX_TAGS: usize = 50;
const MAX_TAG_CHARS: usize = 50;
const MAX_RECIPE_STEPS: usize = 200;
/// One week, in minutes
const MAX_RECIPE_MINUTES: i64 = 10_080;
const MAX_SERVINGS: i64 = 1000;
const MAX_URL_CHARS: usize = 2048;

/// Body of `POST /import-dishes`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub main_dish: DishPayload,
    pub side_dishes: Vec<DishPayload>,
    /// Authorization fields; checked by middleware, ignored here
    pub timestamp: Option<i64>,
    pub hash: Option<String>,
}

/// A dish as submitted for import
///
/// Required fields default to empty so that a missing field is reported by
/// validation alongside every other problem.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DishPayload {
    pub name: String,
    pub slug: String,
    pub dish_type: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub cuisine: Option<String>,
    pub dietary_tags: Vec<String>,
    pub keywords: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub recipe: Option<RecipePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipePayload {
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<String>,
    pub nutrition: Option<Nutrition>,
    pub source_url: Option<String>,
}

/// A dish that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDish {
    pub dish: NewDish,
    pub recipe: Option<NewRecipe>,
}

/// A payload that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedImport {
    pub main: ValidDish,
    pub sides: Vec<ValidDish>,
}

/// Result of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub main_dish_id: i64,
    /// Side dishes whose id resolved after the dish batch
    pub side_dishes_imported: usize,
    pub pairings_written: usize,
    pub recipes_written: usize,
}

/// Import failure, by stage
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import payload failed validation ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Dish batch failed: {0}")]
    DishBatch(#[source] pairing_common::Error),

    #[error("Main dish '{0}' could not be resolved after upsert")]
    MainDishUnresolved(String),

    #[error("Pairing batch failed: {0}")]
    PairingBatch(#[source] pairing_common::Error),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Validation(details) => ApiError::Validation {
                message: "Import payload is invalid".to_string(),
                details,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ========================================
// Validation
// ========================================

/// Collects every rejected field instead of stopping at the first
#[derive(Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn reject(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Required text, trimmed, `1..=max` characters
    fn required(&mut self, field: &str, value: &str, max: usize) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.reject(field, "is required");
        } else if value.chars().count() > max {
            self.reject(field, format!("must be at most {} characters", max));
        }
        value.to_string()
    }

    /// Optional text, trimmed; blank becomes `None`
    fn optional(&mut self, field: &str, value: Option<&str>, max: usize) -> Option<String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        if value.chars().count() > max {
            self.reject(field, format!("must be at most {} characters", max));
        }
        Some(value.to_string())
    }

    /// List of short strings (tags, keywords), trimmed
    fn tags(&mut self, field: &str, values: &[String]) -> Vec<String> {
        if values.len() > MAX_TAGS {
            self.reject(field, format!("must have at most {} entries", MAX_TAGS));
        }
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let value = value.trim();
                if value.is_empty() || value.chars().count() > MAX_TAG_CHARS {
                    self.reject(
                        format!("{field}[{i}]"),
                        format!("must be 1 to {} characters", MAX_TAG_CHARS),
                    );
                }
                value.to_string()
            })
            .collect()
    }

    fn steps(&mut self, field: &str, values: &[String]) -> Vec<String> {
        if values.len() > MAX_RECIPE_STEPS {
            self.reject(field, format!("must have at most {} entries", MAX_RECIPE_STEPS));
        }
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let value = value.trim();
                if value.is_empty() {
                    self.reject(format!("{field}[{i}]"), "must not be empty");
                }
                value.to_string()
            })
            .collect()
    }

    fn range(&mut self, field: &str, value: Option<i64>, min: i64, max: i64) -> Option<i64> {
        if let Some(v) = value {
            if !(min..=max).contains(&v) {
                self.reject(field, format!("must be between {} and {}", min, max));
            }
        }
        value
    }

    fn slug(&mut self, field: &str, value: &str, legacy_prefix: &str) -> String {
        let slug = strip_prefix_keeping_term(value.trim(), legacy_prefix);
        if slug.is_empty() {
            self.reject(field, "is required");
        } else if slug.chars().count() > MAX_SLUG_CHARS {
            self.reject(field, format!("must be at most {} characters", MAX_SLUG_CHARS));
        } else if !is_kebab_case(slug) {
            self.reject(field, "must be lowercase kebab-case (a-z, 0-9 and single hyphens)");
        }
        slug.to_string()
    }

    fn dish(&mut self, field: &str, payload: &DishPayload, legacy_prefix: &str) -> ValidDish {
        let name = self.required(&format!("{field}.name"), &payload.name, MAX_NAME_CHARS);
        let slug = self.slug(&format!("{field}.slug"), &payload.slug, legacy_prefix);

        let dish_type = match payload.dish_type.trim().parse::<DishType>() {
            Ok(dish_type) => dish_type,
            Err(_) => {
                self.reject(
                    format!("{field}.dish_type"),
                    "must be one of main, side, dessert, appetizer, beverage",
                );
                DishType::Main
            }
        };

        let dish = NewDish {
            name,
            slug,
            description: self.optional(
                &format!("{field}.description"),
                payload.description.as_deref(),
                MAX_DESCRIPTION_CHARS,
            ),
            image_url: self.optional(
                &format!("{field}.image_url"),
                payload.image_url.as_deref(),
                MAX_URL_CHARS,
            ),
            cuisine: self.optional(
                &format!("{field}.cuisine"),
                payload.cuisine.as_deref(),
                MAX_NAME_CHARS,
            ),
            dish_type,
            dietary_tags: self.tags(&format!("{field}.dietary_tags"), &payload.dietary_tags),
            keywords: self.tags(&format!("{field}.keywords"), &payload.keywords),
            seo_title: self.optional(
                &format!("{field}.seo_title"),
                payload.seo_title.as_deref(),
                MAX_SEO_TITLE_CHARS,
            ),
            seo_description: self.optional(
                &format!("{field}.seo_description"),
                payload.seo_description.as_deref(),
                MAX_SEO_DESCRIPTION_CHARS,
            ),
        };

        let recipe = payload
            .recipe
            .as_ref()
            .map(|recipe| self.recipe(&format!("{field}.recipe"), recipe));

        ValidDish { dish, recipe }
    }

    fn recipe(&mut self, field: &str, payload: &RecipePayload) -> NewRecipe {
        let difficulty = payload.difficulty.as_deref().and_then(|d| {
            match d.trim().parse::<Difficulty>() {
                Ok(difficulty) => Some(difficulty),
                Err(_) => {
                    self.reject(
                        format!("{field}.difficulty"),
                        "must be one of easy, medium, hard",
                    );
                    None
                }
            }
        });

        let source_url = payload
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                if url.chars().count() > MAX_URL_CHARS
                    || !(url.starts_with("http://") || url.starts_with("https://"))
                {
                    self.reject(
                        format!("{field}.source_url"),
                        format!("must be an http(s) URL of at most {} characters", MAX_URL_CHARS),
                    );
                }
                url.to_string()
            });

        NewRecipe {
            ingredients: self.steps(&format!("{field}.ingredients"), &payload.ingredients),
            instructions: self.steps(&format!("{field}.instructions"), &payload.instructions),
            prep_time: self.range(&format!("{field}.prep_time"), payload.prep_time, 0, MAX_RECIPE_MINUTES),
            cook_time: self.range(&format!("{field}.cook_time"), payload.cook_time, 0, MAX_RECIPE_MINUTES),
            servings: self.range(&format!("{field}.servings"), payload.servings, 1, MAX_SERVINGS),
            difficulty,
            nutrition: payload.nutrition.clone(),
            source_url,
        }
    }
}

/// `[a-z0-9]+(-[a-z0-9]+)*`
pub fn is_kebab_case(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

/// Validate and normalize an import payload
///
/// Returns every rejected field at once.
pub fn validate_import(
    request: &ImportRequest,
    legacy_prefix: &str,
) -> Result<ValidatedImport, Vec<FieldError>> {
    let mut v = Validator::default();

    let main = v.dish("main_dish", &request.main_dish, legacy_prefix);

    let mut seen = std::collections::HashSet::new();
    let sides: Vec<ValidDish> = request
        .side_dishes
        .iter()
        .enumerate()
        .map(|(i, payload)| {
            let field = format!("side_dishes[{i}]");
            let side = v.dish(&field, payload, legacy_prefix);
            if !side.dish.slug.is_empty() {
                if side.dish.slug == main.dish.slug {
                    v.reject(format!("{field}.slug"), "must differ from the main dish slug");
                } else if !seen.insert(side.dish.slug.clone()) {
                    v.reject(format!("{field}.slug"), "duplicates another side dish");
                }
            }
            side
        })
        .collect();

    if v.errors.is_empty() {
        Ok(ValidatedImport { main, sides })
    } else {
        Err(v.errors)
    }
}

/// Match score for the side dish at zero-based payload position `index`
pub fn match_score(index: usize) -> f64 {
    let score = 100_i64.saturating_sub(5 * index as i64).max(5);
    score as f64
}

// ========================================
// Orchestration
// ========================================

/// Runs the staged import against the repository
#[derive(Clone)]
pub struct ImportOrchestrator {
    repo: DishRepository,
    legacy_prefix: String,
}

impl ImportOrchestrator {
    pub fn new(repo: DishRepository, legacy_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            legacy_prefix: legacy_prefix.into().to_lowercase(),
        }
    }

    pub async fn import(&self, request: &ImportRequest) -> Result<ImportSummary, ImportError> {
        let validated =
            validate_import(request, &self.legacy_prefix).map_err(ImportError::Validation)?;

        self.write_dishes(&validated)
            .await
            .map_err(ImportError::DishBatch)?;

        let side_slugs: Vec<String> = validated.sides.iter().map(|s| s.dish.slug.clone()).collect();
        let outcome = self.write_pairings(&validated).await;

        // The dish batch is committed whatever happened next
        self.repo
            .invalidate_after_write(&validated.main.dish.slug, &side_slugs)
            .await;

        match &outcome {
            Ok(summary) => info!(
                main_slug = %validated.main.dish.slug,
                main_dish_id = summary.main_dish_id,
                sides = summary.side_dishes_imported,
                pairings = summary.pairings_written,
                recipes = summary.recipes_written,
                "Import complete"
            ),
            Err(e) => warn!(main_slug = %validated.main.dish.slug, error = %e, "Import failed after dish batch"),
        }

        outcome
    }

    /// Stage 2: all dishes in one transaction
    async fn write_dishes(&self, validated: &ValidatedImport) -> pairing_common::Result<()> {
        let now = timestamp_now();
        let mut tx = self.repo.begin().await?;

        upsert::upsert_dish(&mut tx, &validated.main.dish, &now).await?;
        for side in &validated.sides {
            upsert::upsert_dish(&mut tx, &side.dish, &now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Stages 3 and 4: resolve ids, then pairings and recipes in one transaction
    async fn write_pairings(&self, validated: &ValidatedImport) -> Result<ImportSummary, ImportError> {
        let main_slug = &validated.main.dish.slug;
        let main_id = match self.repo.dish_id_for_slug(main_slug).await {
            Ok(Some(id)) => id,
            Ok(None) => return Err(ImportError::MainDishUnresolved(main_slug.clone())),
            Err(e) => {
                warn!(main_slug = %main_slug, error = %e, "Main dish id lookup failed");
                return Err(ImportError::MainDishUnresolved(main_slug.clone()));
            }
        };

        // Position in the payload is kept even when an earlier side is skipped
        let mut resolved = Vec::with_capacity(validated.sides.len());
        for (index, side) in validated.sides.iter().enumerate() {
            match self.repo.dish_id_for_slug(&side.dish.slug).await {
                Ok(Some(id)) => resolved.push((index, id, side)),
                Ok(None) => warn!(slug = %side.dish.slug, "Side dish missing after upsert, skipping"),
                Err(e) => warn!(slug = %side.dish.slug, error = %e, "Side dish id lookup failed, skipping"),
            }
        }

        let mut summary = ImportSummary {
            main_dish_id: main_id,
            side_dishes_imported: resolved.len(),
            pairings_written: 0,
            recipes_written: 0,
        };

        self.write_pairing_batch(validated.main.recipe.as_ref(), &resolved, &mut summary)
            .await
            .map_err(ImportError::PairingBatch)?;

        Ok(summary)
    }

    async fn write_pairing_batch(
        &self,
        main_recipe: Option<&NewRecipe>,
        sides: &[(usize, i64, &ValidDish)],
        summary: &mut ImportSummary,
    ) -> pairing_common::Result<()> {
        let now = timestamp_now();
        let main_id = summary.main_dish_id;
        let mut tx = self.repo.begin().await?;

        if let Some(recipe) = main_recipe {
            upsert::upsert_recipe(&mut tx, main_id, recipe, &now).await?;
            summary.recipes_written += 1;
        }

        for &(index, side_id, side) in sides {
            let position = index as i64 + 1;
            upsert::upsert_pairing(&mut tx, main_id, side_id, match_score(index), position, &now)
                .await?;
            summary.pairings_written += 1;

            if let Some(recipe) = &side.recipe {
                upsert::upsert_recipe(&mut tx, side_id, recipe, &now).await?;
                summary.recipes_written += 1;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::repository;
    use pairing_common::config::DEFAULT_LEGACY_PREFIX;
    use pairing_common::CacheStatus;

    fn dish(name: &str, slug: &str, dish_type: &str) -> DishPayload {
        DishPayload {
            name: name.to_string(),
            slug: slug.to_string(),
            dish_type: dish_type.to_string(),
            ..DishPayload::default()
        }
    }

    fn request(main: DishPayload, sides: Vec<DishPayload>) -> ImportRequest {
        ImportRequest {
            main_dish: main,
            side_dishes: sides,
            ..ImportRequest::default()
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_kebab_case() {
        assert!(is_kebab_case("15-bean-soup"));
        assert!(is_kebab_case("cornbread"));
        assert!(!is_kebab_case("Cornbread"));
        assert!(!is_kebab_case("bean--soup"));
        assert!(!is_kebab_case("-soup"));
        assert!(!is_kebab_case("soup-"));
        assert!(!is_kebab_case("bean_soup"));
        assert!(!is_kebab_case(""));
    }

    #[test]
    fn test_match_score_floor() {
        assert_eq!(match_score(0), 100.0);
        assert_eq!(match_score(1), 95.0);
        assert_eq!(match_score(18), 10.0);
        assert_eq!(match_score(19), 5.0);
        assert_eq!(match_score(40), 5.0);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut main = dish("", "Bad Slug", "entree");
        main.seo_title = Some("x".repeat(MAX_SEO_TITLE_CHARS + 1));
        let mut side = dish("Cornbread", "cornbread", "side");
        side.recipe = Some(RecipePayload {
            servings: Some(0),
            difficulty: Some("extreme".to_string()),
            source_url: Some("ftp://example.com".to_string()),
            ingredients: vec!["  ".to_string()],
            ..RecipePayload::default()
        });

        let errors = validate_import(&request(main, vec![side]), DEFAULT_LEGACY_PREFIX).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec![
                "main_dish.name",
                "main_dish.slug",
                "main_dish.dish_type",
                "main_dish.seo_title",
                "side_dishes[0].recipe.difficulty",
                "side_dishes[0].recipe.source_url",
                "side_dishes[0].recipe.ingredients[0]",
                "side_dishes[0].recipe.servings",
            ]
        );
    }

    #[test]
    fn test_duplicate_and_self_pairing_rejected() {
        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![
                dish("Cornbread", "cornbread", "side"),
                dish("Cornbread Again", "cornbread", "side"),
                dish("Soup Again", "15-bean-soup", "side"),
            ],
        );
        let errors = validate_import(&req, DEFAULT_LEGACY_PREFIX).unwrap_err();
        assert_eq!(fields(&errors), vec!["side_dishes[1].slug", "side_dishes[2].slug"]);
    }

    #[test]
    fn test_legacy_prefix_stripped_from_slugs() {
        let req = request(
            dish(" 15 Bean Soup ", "what-to-serve-with-15-bean-soup", "main"),
            vec![],
        );
        let validated = validate_import(&req, DEFAULT_LEGACY_PREFIX).unwrap();
        assert_eq!(validated.main.dish.slug, "15-bean-soup");
        assert_eq!(validated.main.dish.name, "15 Bean Soup");
    }

    #[tokio::test]
    async fn test_import_writes_dishes_and_pairings() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        let mut bread = dish("Cornbread", "cornbread", "side");
        bread.recipe = Some(RecipePayload {
            ingredients: vec!["cornmeal".to_string(), "buttermilk".to_string()],
            instructions: vec!["Bake at 200C".to_string()],
            difficulty: Some("easy".to_string()),
            ..RecipePayload::default()
        });
        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![bread, dish("Coleslaw", "coleslaw", "side")],
        );

        let summary = importer.import(&req).await.unwrap();
        assert_eq!(summary.side_dishes_imported, 2);
        assert_eq!(summary.pairings_written, 2);
        assert_eq!(summary.recipes_written, 1);

        let main = repo.get_dish_by_slug("15-bean-soup").await.unwrap().value;
        assert_eq!(main.dish.id, summary.main_dish_id);

        let sides = repo.get_pairings_for_dish(&main.dish).await.unwrap().value;
        assert_eq!(sides.len(), 2);
        assert_eq!(sides[0].dish.name, "Cornbread");
        assert_eq!(sides[0].match_score, 100.0);
        assert_eq!(sides[0].order_position, 1);
        assert_eq!(sides[0].recipe.as_ref().unwrap().ingredients.len(), 2);
        assert_eq!(sides[1].match_score, 95.0);
        assert_eq!(sides[1].order_position, 2);
    }

    #[tokio::test]
    async fn test_reimport_updates_in_place() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        let first = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![dish("Cornbread", "cornbread", "side"), dish("Coleslaw", "coleslaw", "side")],
        );
        let first_summary = importer.import(&first).await.unwrap();

        let mut renamed = dish("Fifteen Bean Soup", "15-bean-soup", "main");
        renamed.description = Some("Hearty".to_string());
        let second = request(
            renamed,
            vec![dish("Coleslaw", "coleslaw", "side"), dish("Cornbread", "cornbread", "side")],
        );
        let second_summary = importer.import(&second).await.unwrap();
        assert_eq!(first_summary.main_dish_id, second_summary.main_dish_id);

        let (dishes, pairings): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM dishes), (SELECT COUNT(*) FROM pairings)",
        )
        .fetch_one(repo.pool())
        .await
        .unwrap();
        assert_eq!((dishes, pairings), (3, 2));

        let main = repo.find_dish_by_slug("15-bean-soup").await.unwrap().unwrap();
        assert_eq!(main.dish.name, "Fifteen Bean Soup");
        assert_eq!(main.dish.description.as_deref(), Some("Hearty"));

        let sides = repo.get_pairings_for_dish(&main.dish).await.unwrap().value;
        let slugs: Vec<&str> = sides.iter().map(|s| s.dish.slug.as_str()).collect();
        assert_eq!(slugs, vec!["coleslaw", "cornbread"]);
    }

    #[tokio::test]
    async fn test_import_invalidates_cached_reads() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        let req = request(dish("15 Bean Soup", "15-bean-soup", "main"), vec![]);
        importer.import(&req).await.unwrap();

        let cached = repo.get_dish_by_slug("15-bean-soup").await.unwrap();
        assert_eq!(cached.status, CacheStatus::Miss);
        let main = cached.value.dish;
        repo.get_pairings_for_dish(&main).await.unwrap();
        repo.list_categories().await.unwrap();

        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![dish("Cornbread", "cornbread", "side")],
        );
        importer.import(&req).await.unwrap();

        assert_eq!(repo.get_dish_by_slug("15-bean-soup").await.unwrap().status, CacheStatus::Miss);
        let sides = repo.get_pairings_for_dish(&main).await.unwrap();
        assert_eq!(sides.status, CacheStatus::Miss);
        assert_eq!(sides.value.len(), 1);
        let categories = repo.list_categories().await.unwrap();
        assert_eq!(categories.status, CacheStatus::Miss);
        assert_eq!(categories.value, vec![DishType::Main, DishType::Side]);
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![dish("Cornbread", "cornbread", "bread")],
        );
        let err = importer.import(&req).await.unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dishes")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pairing_batch_failure_keeps_dishes() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        sqlx::query(
            "CREATE TRIGGER reject_pairings BEFORE INSERT ON pairings
             BEGIN SELECT RAISE(ABORT, 'pairings unavailable'); END",
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![dish("Cornbread", "cornbread", "side")],
        );
        let err = importer.import(&req).await.unwrap_err();
        assert!(matches!(err, ImportError::PairingBatch(_)));

        assert!(repo.find_dish_by_slug("15-bean-soup").await.unwrap().is_some());
        assert!(repo.find_dish_by_slug("cornbread").await.unwrap().is_some());
        let pairings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pairings")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(pairings, 0);
    }

    async fn count(repo: &DishRepository, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(repo.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dish_batch_failure_writes_nothing() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        sqlx::query(
            "CREATE TRIGGER reject_coleslaw BEFORE INSERT ON dishes
             WHEN NEW.slug = 'coleslaw'
             BEGIN SELECT RAISE(ABORT, 'dishes unavailable'); END",
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let mut main = dish("15 Bean Soup", "15-bean-soup", "main");
        main.recipe = Some(RecipePayload {
            ingredients: vec!["beans".to_string()],
            instructions: vec!["Simmer".to_string()],
            ..RecipePayload::default()
        });
        let req = request(
            main,
            vec![dish("Cornbread", "cornbread", "side"), dish("Coleslaw", "coleslaw", "side")],
        );

        let err = importer.import(&req).await.unwrap_err();
        assert!(matches!(err, ImportError::DishBatch(_)), "got {err:?}");

        // Earlier rows of the batch are rolled back with it
        assert_eq!(count(&repo, "dishes").await, 0);
        assert_eq!(count(&repo, "pairings").await, 0);
        assert_eq!(count(&repo, "recipes").await, 0);
    }

    #[tokio::test]
    async fn test_unresolved_side_dish_is_skipped() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), DEFAULT_LEGACY_PREFIX);

        // The row vanishes inside the dish batch, so its id cannot be re-read
        sqlx::query(
            "CREATE TRIGGER drop_coleslaw AFTER INSERT ON dishes
             WHEN NEW.slug = 'coleslaw'
             BEGIN DELETE FROM dishes WHERE id = NEW.id; END",
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let req = request(
            dish("15 Bean Soup", "15-bean-soup", "main"),
            vec![
                dish("Cornbread", "cornbread", "side"),
                dish("Coleslaw", "coleslaw", "side"),
                dish("Green Salad", "green-salad", "side"),
            ],
        );

        let summary = importer.import(&req).await.unwrap();
        assert_eq!(summary.side_dishes_imported, 2);
        assert_eq!(summary.pairings_written, 2);

        let main = repo.get_dish_by_slug("15-bean-soup").await.unwrap().value;
        let sides = repo.get_pairings_for_dish(&main.dish).await.unwrap().value;
        let placed: Vec<(&str, i64, f64)> = sides
            .iter()
            .map(|s| (s.dish.slug.as_str(), s.order_position, s.match_score))
            .collect();
        // Positions and scores follow the payload, not the surviving sides
        assert_eq!(placed, vec![("cornbread", 1, 100.0), ("green-salad", 3, 90.0)]);
    }

    #[tokio::test]
    async fn test_mixed_case_prefix_is_stripped() {
        let repo = repository().await;
        let importer = ImportOrchestrator::new(repo.clone(), "What-To-Serve-With-");

        let req = request(
            dish("15 Bean Soup", "what-to-serve-with-15-bean-soup", "main"),
            vec![dish("Cornbread", "what-to-serve-with-cornbread", "side")],
        );
        importer.import(&req).await.unwrap();

        assert!(repo.find_dish_by_slug("15-bean-soup").await.unwrap().is_some());
        assert!(repo.find_dish_by_slug("cornbread").await.unwrap().is_some());
        assert!(repo
            .find_dish_by_slug("what-to-serve-with-cornbread")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_import_error_mapping() {
        let api: ApiError = ImportError::Validation(vec![FieldError::new("main_dish.name", "is required")]).into();
        assert_eq!(api.code(), "VALIDATION_ERROR");

        let api: ApiError = ImportError::MainDishUnresolved("soup".into()).into();
        assert_eq!(api.code(), "INTERNAL_ERROR");
    }
}
