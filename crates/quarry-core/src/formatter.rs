//! Output formatting: provider items → normalized documents.
//!
//! Normalization ([`normalize_items`]) is pure and runs before a job's
//! terminal transition, so the committed [`ResultSet`] is written together
//! with the `scraped` status. Delivery ([`OutputFormatter`]) performs the side
//! effects and runs only for the resolver whose transition was accepted.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::job::{JobStatus, ScrapeJob, ScraperType};
use crate::traits::{DocumentStore, EmbeddingTrigger, ResultSink, UsageRecorder};

// =============================================================================
// Output Configuration
// =============================================================================

/// Formatting instructions stored with each job.
///
/// Field paths are dotted JSON paths (`owner.username`, `images.0.url`).
/// Unset paths fall back to per-scraper-type defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub title_field: Option<String>,
    pub content_field: Option<String>,
    pub url_field: Option<String>,
    /// Target metadata key → source path.
    pub field_mapping: BTreeMap<String, String>,
    /// Items missing any of these paths are dropped.
    pub required_fields: Vec<String>,
    pub max_items: Option<usize>,
}

impl OutputConfig {
    pub fn with_title_field(mut self, path: impl Into<String>) -> Self {
        self.title_field = Some(path.into());
        self
    }

    pub fn with_content_field(mut self, path: impl Into<String>) -> Self {
        self.content_field = Some(path.into());
        self
    }

    pub fn with_url_field(mut self, path: impl Into<String>) -> Self {
        self.url_field = Some(path.into());
        self
    }

    pub fn with_mapping(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.field_mapping.insert(target.into(), source.into());
        self
    }

    pub fn with_required_field(mut self, path: impl Into<String>) -> Self {
        self.required_fields.push(path.into());
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Fill unset field paths from `defaults`, keeping values already set.
    pub fn merged_with(mut self, defaults: &OutputConfig) -> Self {
        if self.title_field.is_none() {
            self.title_field = defaults.title_field.clone();
        }
        if self.content_field.is_none() {
            self.content_field = defaults.content_field.clone();
        }
        if self.url_field.is_none() {
            self.url_field = defaults.url_field.clone();
        }
        for (target, source) in &defaults.field_mapping {
            self.field_mapping
                .entry(target.clone())
                .or_insert_with(|| source.clone());
        }
        if self.max_items.is_none() {
            self.max_items = defaults.max_items;
        }
        self
    }
}

struct FieldPaths<'a> {
    title: &'a str,
    content: &'a str,
    url: &'a str,
}

fn default_paths(scraper_type: ScraperType) -> FieldPaths<'static> {
    match scraper_type {
        ScraperType::Profile => FieldPaths {
            title: "fullName",
            content: "biography",
            url: "url",
        },
        ScraperType::Posts => FieldPaths {
            title: "ownerUsername",
            content: "caption",
            url: "url",
        },
        ScraperType::Comments => FieldPaths {
            title: "ownerUsername",
            content: "text",
            url: "postUrl",
        },
    }
}

// =============================================================================
// Normalized Output
// =============================================================================

/// Canonical document produced from one provider item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Stable key within the job: item `id`, else `url`, else `item-{index}`.
    pub source_key: String,
    pub title: Option<String>,
    pub content: String,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// The committed result of a scraped job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub documents: Vec<NormalizedDocument>,
    /// Number of raw items the provider returned.
    pub item_count: usize,
    /// Items dropped by filtering, deduplication or `max_items`.
    pub dropped_count: usize,
    /// Provider result handle the items came from, if any.
    pub source: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ResultSet {
    /// Normalize `items` and wrap them in a result set.
    pub fn from_items(
        scraper_type: ScraperType,
        items: &[Value],
        output_config: &OutputConfig,
        source: Option<String>,
    ) -> Self {
        let documents = normalize_items(scraper_type, items, output_config);
        Self {
            item_count: items.len(),
            dropped_count: items.len().saturating_sub(documents.len()),
            documents,
            source,
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Normalize provider items into documents.
///
/// Drops non-object items and items missing a required field, deduplicates by
/// source key (first occurrence wins) and truncates to `max_items`.
pub fn normalize_items(
    scraper_type: ScraperType,
    items: &[Value],
    output_config: &OutputConfig,
) -> Vec<NormalizedDocument> {
    let defaults = default_paths(scraper_type);
    let title_path = output_config.title_field.as_deref().unwrap_or(defaults.title);
    let content_path = output_config
        .content_field
        .as_deref()
        .unwrap_or(defaults.content);
    let url_path = output_config.url_field.as_deref().unwrap_or(defaults.url);

    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            debug!(index, "Skipping non-object item");
            continue;
        }

        if let Some(missing) = output_config
            .required_fields
            .iter()
            .find(|path| !lookup_path(item, path).is_some_and(has_value))
        {
            debug!(index, field = %missing, "Skipping item missing required field");
            continue;
        }

        let source_key = source_key(item, index);
        if !seen.insert(source_key.clone()) {
            continue;
        }

        let content = lookup_path(item, content_path)
            .and_then(value_to_text)
            .unwrap_or_else(|| item.to_string());

        let metadata = output_config
            .field_mapping
            .iter()
            .filter_map(|(target, source)| {
                lookup_path(item, source).map(|value| (target.clone(), value.clone()))
            })
            .collect();

        documents.push(NormalizedDocument {
            source_key,
            title: lookup_path(item, title_path).and_then(value_to_text),
            content,
            url: lookup_path(item, url_path).and_then(value_to_text),
            metadata,
        });

        if output_config
            .max_items
            .is_some_and(|max| documents.len() >= max)
        {
            break;
        }
    }

    documents
}

/// Resolve a dotted path; numeric segments index into arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// A value counts as present unless it is null, an empty string or an empty array.
pub fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn source_key(item: &Value, index: usize) -> String {
    ["id", "url"]
        .iter()
        .filter_map(|field| item.get(*field))
        .find_map(value_to_text)
        .unwrap_or_else(|| format!("item-{}", index))
}

// =============================================================================
// Delivery
// =============================================================================

/// Side effects performed for one committed result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Documents inserted by this delivery (excludes ones already stored).
    pub documents_created: usize,
    pub embeddings_triggered: usize,
    pub embedding_failures: usize,
    pub usage_recorded: bool,
}

/// Persists a committed result set and notifies downstream collaborators.
///
/// Failures are logged and reported, never propagated: the job's terminal
/// status stands regardless.
#[derive(Clone)]
pub struct OutputFormatter<D, E, U>
where
    D: DocumentStore,
    E: EmbeddingTrigger,
    U: UsageRecorder,
{
    documents: D,
    embeddings: E,
    usage: U,
}

impl<D, E, U> OutputFormatter<D, E, U>
where
    D: DocumentStore,
    E: EmbeddingTrigger,
    U: UsageRecorder,
{
    pub fn new(documents: D, embeddings: E, usage: U) -> Self {
        Self {
            documents,
            embeddings,
            usage,
        }
    }
}

impl<D, E, U> ResultSink for OutputFormatter<D, E, U>
where
    D: DocumentStore,
    E: EmbeddingTrigger,
    U: UsageRecorder,
{
    async fn deliver(&self, job: &ScrapeJob) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let Some(result) = job.result.as_ref().filter(|_| job.status == JobStatus::Scraped)
        else {
            return report;
        };

        let created = match self.documents.insert_documents(job, &result.documents).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to store documents");
                return report;
            }
        };
        report.documents_created = created.len();

        for document_id in &created {
            match self.embeddings.trigger(*document_id).await {
                Ok(()) => report.embeddings_triggered += 1,
                Err(e) => {
                    report.embedding_failures += 1;
                    warn!(job_id = %job.id, %document_id, error = %e, "Embedding trigger failed");
                }
            }
        }

        match self
            .usage
            .record_usage(job.project_id, job.id, result.documents.len())
            .await
        {
            Ok(()) => report.usage_recorded = true,
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to record usage"),
        }

        info!(
            job_id = %job.id,
            documents = report.documents_created,
            embeddings = report.embeddings_triggered,
            "Delivered scrape result"
        );
        report
    }
}
