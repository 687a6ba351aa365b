//! Slug resolution
//!
//! Turns a loosely formatted path segment into a canonical dish. Inbound links
//! come from several historical slug schemes, so resolution is permissive: an
//! ordered list of [`Strategy`] values is tried until one produces a hit or a
//! suggestion. The stored slug stays authoritative; whenever the caller's
//! input differs from it, the caller redirects to the canonical URL.

use crate::repository::DishRepository;
use pairing_common::db::{Dish, DishDetail};
use pairing_common::{CacheStatus, Result};
use tracing::debug;

/// Leading indefinite/definite articles stripped by the fallback strategies
const ARTICLES: [&str; 3] = ["a-", "an-", "the-"];

/// Shortest term the similar-name strategy will search for
const MIN_SIMILAR_TERM_CHARS: usize = 3;

/// Candidates fetched by the similar-name strategy; more than one means ambiguous
const SUBSTRING_PROBE: i64 = 2;

/// One way of matching an identifier to a stored slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Exact lookup after removing the legacy routing prefix
    LegacyPrefix,
    /// Exact lookup of the unstripped form, then of the input as received
    /// (trimmed only), for stored slugs that predate normalization
    OriginalForm,
    /// Exact lookup after removing a leading article
    ArticleExact,
    /// Shortest slug containing the article-stripped term
    ArticleSubstring,
    /// Unique dish whose name contains the term; offered as a suggestion
    SimilarName,
}

/// Order in which strategies run; the first hit or suggestion wins
pub const RESOLUTION_ORDER: [Strategy; 5] = [
    Strategy::LegacyPrefix,
    Strategy::OriginalForm,
    Strategy::ArticleExact,
    Strategy::ArticleSubstring,
    Strategy::SimilarName,
];

/// Outcome of resolving an identifier
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Definitive match; `redirect` is set when the input is not the stored slug
    Found {
        dish: DishDetail,
        redirect: bool,
        status: CacheStatus,
    },
    /// Best-effort guess; the caller redirects to it instead of serving it
    Suggested { dish: Dish },
    NotFound,
}

enum Step {
    Hit(DishDetail, CacheStatus),
    Suggest(Dish),
    Continue,
}

/// Forms of the input shared by every strategy
#[derive(Debug)]
struct Identifier {
    /// Input with surrounding whitespace and slashes removed, case kept
    original: String,
    /// After [`normalize_identifier`]
    normalized: String,
    /// Normalized with the legacy prefix removed
    stripped: String,
    /// Stripped with a leading article removed, if one was present
    without_article: Option<String>,
}

impl Identifier {
    fn new(raw: &str, legacy_prefix: &str) -> Self {
        let original = trim_identifier(raw).to_string();
        let normalized = normalize_identifier(raw);

        let stripped = strip_prefix_keeping_term(&normalized, legacy_prefix).to_string();

        let without_article = ARTICLES.iter().find_map(|article| {
            stripped
                .strip_prefix(article)
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
        });

        Self {
            original,
            normalized,
            stripped,
            without_article,
        }
    }

    /// Term used by the similar-name strategy
    fn search_term(&self) -> &str {
        self.without_article.as_deref().unwrap_or(&self.stripped)
    }
}

/// Trim whitespace and slashes, lowercase, and turn whitespace/underscore runs
/// into single hyphens
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = trim_identifier(raw);

    let mut out = String::with_capacity(trimmed.len());
    let mut in_gap = false;
    for c in trimmed.chars() {
        if c.is_whitespace() || c == '_' {
            if !in_gap {
                out.push('-');
                in_gap = true;
            }
        } else {
            in_gap = false;
            out.extend(c.to_lowercase());
        }
    }
    out
}

fn trim_identifier(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '/')
}

/// Resolves user-supplied identifiers against stored canonical slugs
#[derive(Clone)]
pub struct SlugResolver {
    repo: DishRepository,
    legacy_prefix: String,
}

impl SlugResolver {
    pub fn new(repo: DishRepository, legacy_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            legacy_prefix: legacy_prefix.into().to_lowercase(),
        }
    }

    pub fn legacy_prefix(&self) -> &str {
        &self.legacy_prefix
    }

    /// Remove the legacy prefix from an already normalized slug
    pub fn strip_legacy_prefix<'a>(&self, slug: &'a str) -> &'a str {
        strip_prefix_keeping_term(slug, &self.legacy_prefix)
    }

    /// Resolve `raw` by running [`RESOLUTION_ORDER`]
    ///
    /// Store failures propagate; not-found is a [`Resolution`], not an error.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        let ident = Identifier::new(raw, &self.legacy_prefix);
        if ident.normalized.is_empty() {
            return Ok(Resolution::NotFound);
        }

        for strategy in RESOLUTION_ORDER {
            match self.apply(strategy, &ident).await? {
                Step::Hit(dish, status) => {
                    let redirect = raw != dish.dish.slug;
                    debug!(input = raw, slug = %dish.dish.slug, ?strategy, redirect, "Resolved slug");
                    return Ok(Resolution::Found {
                        dish,
                        redirect,
                        status,
                    });
                }
                Step::Suggest(dish) => {
                    debug!(input = raw, slug = %dish.slug, ?strategy, "Suggesting similar dish");
                    return Ok(Resolution::Suggested { dish });
                }
                Step::Continue => {}
            }
        }

        debug!(input = raw, "Slug not resolved");
        Ok(Resolution::NotFound)
    }

    async fn apply(&self, strategy: Strategy, ident: &Identifier) -> Result<Step> {
        match strategy {
            Strategy::LegacyPrefix => self.exact(&ident.stripped).await,
            Strategy::OriginalForm => {
                if ident.normalized != ident.stripped {
                    if let step @ Step::Hit(..) = self.exact(&ident.normalized).await? {
                        return Ok(step);
                    }
                }
                if ident.original != ident.normalized && ident.original != ident.stripped {
                    return self.exact(&ident.original).await;
                }
                Ok(Step::Continue)
            }
            Strategy::ArticleExact => match &ident.without_article {
                Some(term) => self.exact(term).await,
                None => Ok(Step::Continue),
            },
            Strategy::ArticleSubstring => {
                let Some(term) = &ident.without_article else {
                    return Ok(Step::Continue);
                };
                let candidates = self.repo.find_by_slug_containing(term, 1).await?;
                match candidates.first() {
                    Some(dish) => self.exact(&dish.slug).await,
                    None => Ok(Step::Continue),
                }
            }
            Strategy::SimilarName => {
                let term = ident.search_term();
                if term.chars().count() < MIN_SIMILAR_TERM_CHARS {
                    return Ok(Step::Continue);
                }

                let spaced = term.replace('-', " ");
                let mut candidates = self.repo.find_by_name_containing(&spaced, SUBSTRING_PROBE).await?;
                if candidates.is_empty() {
                    candidates = self.repo.find_by_slug_containing(term, SUBSTRING_PROBE).await?;
                }

                Ok(unique(candidates).map_or(Step::Continue, Step::Suggest))
            }
        }
    }

    async fn exact(&self, slug: &str) -> Result<Step> {
        match self.repo.get_dish_by_slug(slug).await {
            Ok(cached) => Ok(Step::Hit(cached.value, cached.status)),
            Err(e) if e.is_not_found() => Ok(Step::Continue),
            Err(e) => Err(e),
        }
    }
}

/// `slug` without `prefix`, unless that would leave nothing
pub(crate) fn strip_prefix_keeping_term<'a>(slug: &'a str, prefix: &str) -> &'a str {
    match slug.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() && !rest.is_empty() => rest,
        _ => slug,
    }
}

/// The only candidate, or `None` when there are zero or several
fn unique(mut candidates: Vec<Dish>) -> Option<Dish> {
    if candidates.len() == 1 {
        candidates.pop()
    } else {
        None
    }
}
