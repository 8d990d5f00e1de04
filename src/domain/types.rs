//! Listing kinds and the filter vocabulary each listing understands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// The three content listings aggregated from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Hackathons,
    Jobs,
    Resources,
}

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [
        ListingKind::Hackathons,
        ListingKind::Jobs,
        ListingKind::Resources,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ListingKind::Hackathons => "hackathons",
            ListingKind::Jobs => "jobs",
            ListingKind::Resources => "resources",
        }
    }

    /// Public path of the listing page, e.g. `/jobs`.
    pub fn path(self) -> String {
        format!("/{}", self.as_str())
    }

    /// Parameters holding comma-joined multi-select ids, in display order.
    pub fn multi_params(self) -> &'static [&'static str] {
        match self {
            ListingKind::Hackathons => &["category", "status", "location", "date"],
            ListingKind::Jobs => &["category", "job_type", "location", "category_type"],
            ListingKind::Resources => &[
                "category",
                "language",
                "resource_type",
                "price_type",
                "difficulty_level",
            ],
        }
    }

    /// Numeric minimum filter (`price` for hackathons, `salary` for jobs).
    pub fn amount_param(self) -> Option<&'static str> {
        match self {
            ListingKind::Hackathons => Some("price"),
            ListingKind::Jobs => Some("salary"),
            ListingKind::Resources => None,
        }
    }

    /// Whether the listing offers a custom `startDate`/`endDate` range.
    pub fn has_date_range(self) -> bool {
        matches!(self, ListingKind::Hackathons)
    }

    pub fn sort_options(self) -> &'static [SortOrder] {
        match self {
            ListingKind::Hackathons => &[
                SortOrder::Newest,
                SortOrder::Oldest,
                SortOrder::PrizeHigh,
                SortOrder::PrizeLow,
            ],
            ListingKind::Jobs => &[
                SortOrder::Newest,
                SortOrder::Oldest,
                SortOrder::SalaryHigh,
                SortOrder::SalaryLow,
            ],
            ListingKind::Resources => &[SortOrder::Newest, SortOrder::Oldest],
        }
    }

    /// Facet metadata endpoints consulted when a listing page loads.
    pub fn facet_sources(self) -> &'static [FacetSource] {
        match self {
            ListingKind::Hackathons => HACKATHON_FACETS,
            ListingKind::Jobs => JOB_FACETS,
            ListingKind::Resources => RESOURCE_FACETS,
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hackathons" => Ok(ListingKind::Hackathons),
            "jobs" => Ok(ListingKind::Jobs),
            "resources" => Ok(ListingKind::Resources),
            other => Err(DomainError::validation(format!(
                "unknown listing `{other}`"
            ))),
        }
    }
}

/// Ordering requested through the `sortby` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PrizeHigh,
    PrizeLow,
    SalaryHigh,
    SalaryLow,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::PrizeHigh => "prize_high",
            SortOrder::PrizeLow => "prize_low",
            SortOrder::SalaryHigh => "salary_high",
            SortOrder::SalaryLow => "salary_low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Newest => "Newest First",
            SortOrder::Oldest => "Oldest First",
            SortOrder::PrizeHigh => "Prize: High to Low",
            SortOrder::PrizeLow => "Prize: Low to High",
            SortOrder::SalaryHigh => "Salary: High to Low",
            SortOrder::SalaryLow => "Salary: Low to High",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "prize_high" => Ok(SortOrder::PrizeHigh),
            "prize_low" => Ok(SortOrder::PrizeLow),
            "salary_high" => Ok(SortOrder::SalaryHigh),
            "salary_low" => Ok(SortOrder::SalaryLow),
            other => Err(DomainError::validation(format!(
                "unknown sort order `{other}`"
            ))),
        }
    }
}

/// A backend endpoint listing the options of one facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetSource {
    /// Key used in listing payloads, e.g. `locations`.
    pub name: &'static str,
    /// Backend path relative to the base URL.
    pub endpoint: &'static str,
    /// Query parameter the facet filters on.
    pub param: &'static str,
    /// Sitemap file group, without the `sitemap-` prefix.
    pub sitemap_group: &'static str,
    pub sitemap_priority: &'static str,
    /// Also emit a `?param=<name-slug>` URL next to the id form.
    pub sitemap_name_variant: bool,
}

const HACKATHON_FACETS: &[FacetSource] = &[
    FacetSource {
        name: "categories",
        endpoint: "hackathons/getcategory",
        param: "category",
        sitemap_group: "hackathons-categories",
        sitemap_priority: "0.8",
        sitemap_name_variant: true,
    },
    FacetSource {
        name: "locations",
        endpoint: "hackathons/getlocation",
        param: "location",
        sitemap_group: "hackathons-locations",
        sitemap_priority: "0.7",
        sitemap_name_variant: true,
    },
    FacetSource {
        name: "statuses",
        endpoint: "hackathons/getstatus",
        param: "status",
        sitemap_group: "hackathons-statuses",
        sitemap_priority: "0.7",
        sitemap_name_variant: true,
    },
];

const JOB_FACETS: &[FacetSource] = &[
    FacetSource {
        name: "categories",
        endpoint: "jobs/getjobcategories",
        param: "category",
        sitemap_group: "jobs-categories",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "job_types",
        endpoint: "jobs/job-types",
        param: "job_type",
        sitemap_group: "jobs-types",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "locations",
        endpoint: "jobs/getjoblocations",
        param: "location",
        sitemap_group: "jobs-locations",
        sitemap_priority: "0.7",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "category_types",
        endpoint: "jobs/category-types",
        param: "category_type",
        sitemap_group: "jobs-category-types",
        sitemap_priority: "0.7",
        sitemap_name_variant: false,
    },
];

const RESOURCE_FACETS: &[FacetSource] = &[
    FacetSource {
        name: "categories",
        endpoint: "resources/categories",
        param: "category",
        sitemap_group: "resources-categories",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "difficulty_levels",
        endpoint: "resources/difficulty-levels",
        param: "difficulty_level",
        sitemap_group: "resources-difficulty-levels",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "languages",
        endpoint: "resources/languages",
        param: "language",
        sitemap_group: "resources-languages",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "price_types",
        endpoint: "resources/price",
        param: "price_type",
        sitemap_group: "resources-price-types",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
    FacetSource {
        name: "types",
        endpoint: "resources/types",
        param: "resource_type",
        sitemap_group: "resources-types",
        sitemap_priority: "0.8",
        sitemap_name_variant: false,
    },
];
