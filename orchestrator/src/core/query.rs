//! Provider query construction

use shared::{DateRange, Entity};

use crate::config::ProviderSettings;
use crate::types::ProviderRequest;

/// Natural-language query asking the provider about one (institution, entity) pair
///
/// The entity's first country narrows the search; the institution's region
/// is used when the entity lists none.
pub fn build_query(target_institution: &str, region: Option<&str>, entity: &Entity) -> String {
    let location = entity
        .primary_country()
        .or(region)
        .map(|place| format!(" ({place})"))
        .unwrap_or_default();

    format!(
        "Find any documented relationship between {target_institution} and {name}{location}. \
         Identify whether the relationship is direct or runs through intermediary organizations, \
         and cite the sources. Answer as JSON with the keys relationship_type (\"Direct\", \
         \"Indirect\" or null), finding_summary and intermediary_organizations.",
        name = entity.name,
    )
}

impl ProviderSettings {
    /// Request body for one search call
    pub fn request_for(&self, query: String, date_range: Option<&DateRange>) -> ProviderRequest {
        let fmt_date = |date: chrono::NaiveDate| date.format("%Y-%m-%d").to_string();
        ProviderRequest {
            query,
            depth: self.depth.clone(),
            output_type: self.output_type.clone(),
            exclude_domains: self.exclude_domains.clone(),
            from_date: date_range.and_then(|range| range.from).map(fmt_date),
            to_date: date_range.and_then(|range| range.to).map(fmt_date),
        }
    }
}
