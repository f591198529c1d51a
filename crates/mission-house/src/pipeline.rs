//! Caller-facing acquisition service.
//!
//! Chains listing acquisition, catchment-school lookup and NAPLAN
//! enrichment. A failed listing load points the caller at the pasted-HTML
//! path; a failed school lookup blocks the record unless schools are
//! skipped; a failed assessment lookup is logged and left out.

use crate::acquisition::{ContentFetcher, FetchResult};
use crate::config::AcquireConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use crate::extraction::{extract_property, validate_property};
use crate::flows::{FlowRunner, NaplanLookupFlow, PropertyPageFlow, SchoolCatchmentFlow};
use crate::intelligence::cache::school_key;
use crate::intelligence::LookupCache;
use crate::renderer::Renderer;
use crate::scoring::QualityScorer;
use crate::types::{
    AssessmentScoreSet, EnrichedProperty, PropertyRecord, SchoolEnrichment, SchoolRecord,
    SchoolType, Schools,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Options for [`AcquisitionPipeline::enrich`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    /// Save the property without a school lookup.
    pub skip_schools: bool,
}

/// Zoned schools for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchmentSchools {
    pub primary: SchoolRecord,
    pub secondary: SchoolRecord,
}

pub struct AcquisitionPipeline {
    config: AcquireConfig,
    runner: FlowRunner,
    fetcher: ContentFetcher,
    schools: LookupCache<SchoolRecord>,
    scorer: QualityScorer,
}

impl AcquisitionPipeline {
    pub fn new(config: AcquireConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let runner = FlowRunner::from_config(renderer, &config);
        let fetcher = ContentFetcher::new(&config.fetch)?;
        let schools = LookupCache::new(config.cache.capacity, config.cache.ttl());
        Ok(Self {
            config,
            runner,
            fetcher,
            schools,
            scorer: QualityScorer::new(),
        })
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Plain retrieval, no rendering.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let deadline = Deadline::after(self.config.fetch.timeout());
        self.fetcher.get(url, &deadline).await
    }

    /// Load, extract and validate a listing.
    pub async fn acquire_property(&self, url: &str) -> Result<PropertyRecord> {
        let flow = PropertyPageFlow::new(url, self.config.property.clone())?;
        match self.runner.run(&flow).await {
            Ok(result) => {
                info!("acquired {url} in {} attempt(s)", result.attempts);
                result.payload.ok_or_else(|| {
                    AcquireError::Extraction(format!("property flow for {url} returned no record"))
                })
            }
            Err(e) => Err(AcquireError::ManualEntryRequired {
                url: url.to_string(),
                cause: Box::new(e),
            }),
        }
    }

    /// Extract and validate a listing from HTML supplied by the caller.
    pub fn property_from_html(&self, html: &str, url: Option<&str>) -> Result<PropertyRecord> {
        let record = extract_property(html, url.unwrap_or_default(), chrono::Utc::now().date_naive());
        validate_property(&record)?;
        Ok(record)
    }

    /// Primary and secondary schools zoned for `address`.
    ///
    /// Both come from one session when neither is cached.
    pub async fn lookup_schools(&self, address: &str) -> Result<CatchmentSchools> {
        let primary_key = school_key(address, SchoolType::Primary);
        let secondary_key = school_key(address, SchoolType::Secondary);

        let primary = self
            .schools
            .get_or_try_insert(&primary_key, {
                let secondary_key = &secondary_key;
                move || async move {
                    let flow = SchoolCatchmentFlow::new(address, self.config.schools.clone());
                    let mut primary = None;
                    for record in self.run_school_flow(&flow).await? {
                        match record.school_type {
                            SchoolType::Primary => primary = Some(record),
                            SchoolType::Secondary => self.schools.insert(secondary_key, record),
                        }
                    }
                    primary.ok_or_else(|| AcquireError::Extraction("no primary school found".into()))
                }
            })
            .await?;

        let secondary = self
            .schools
            .get_or_try_insert(&secondary_key, move || async move {
                let flow =
                    SchoolCatchmentFlow::only(address, SchoolType::Secondary, self.config.schools.clone());
                self.run_school_flow(&flow)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| AcquireError::Extraction("no secondary school found".into()))
            })
            .await?;

        Ok(CatchmentSchools { primary, secondary })
    }

    async fn run_school_flow(&self, flow: &SchoolCatchmentFlow) -> Result<Vec<SchoolRecord>> {
        let result = self.runner.run(flow).await?;
        Ok(result.payload.unwrap_or_default())
    }

    /// NAPLAN results for a school, searched by name.
    pub async fn lookup_assessment(&self, school_name: &str) -> Result<AssessmentScoreSet> {
        let flow = NaplanLookupFlow::new(school_name, self.config.naplan.clone());
        let result = self.runner.run(&flow).await?;
        result
            .payload
            .ok_or_else(|| AcquireError::Extraction(format!("no results for {school_name}")))
    }

    async fn enrich_school(&self, school: SchoolRecord) -> SchoolEnrichment {
        match self.lookup_assessment(&school.name).await {
            Ok(scores) => {
                let quality = self.scorer.score(&scores, school.school_type);
                SchoolEnrichment {
                    school,
                    naplan: Some(scores),
                    quality,
                }
            }
            Err(e) => {
                warn!("NAPLAN lookup for {} failed, leaving it out: {e}", school.name);
                SchoolEnrichment {
                    school,
                    naplan: None,
                    quality: None,
                }
            }
        }
    }

    /// Attach schools and their assessment data to a property.
    pub async fn enrich(&self, property: PropertyRecord, options: EnrichOptions) -> Result<EnrichedProperty> {
        if options.skip_schools {
            info!("skipping school lookup for {}", property.address);
            return Ok(EnrichedProperty {
                property,
                schools: Schools::Skipped,
            });
        }

        let found = self.lookup_schools(&property.address).await?;
        let primary = self.enrich_school(found.primary).await;
        let secondary = self.enrich_school(found.secondary).await;
        Ok(EnrichedProperty {
            property,
            schools: Schools::Found { primary, secondary },
        })
    }

    /// Enrich many properties, at most `concurrency` at a time. Results keep
    /// input order.
    pub async fn enrich_many(
        &self,
        properties: Vec<PropertyRecord>,
        options: EnrichOptions,
        concurrency: usize,
    ) -> Vec<Result<EnrichedProperty>> {
        stream::iter(properties)
            .map(|property| self.enrich(property, options))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
