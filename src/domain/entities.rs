//! Records relayed from the content backend.
//!
//! The backend owns these shapes; fields the site does not interpret are kept in
//! `extra` so relaying a record never drops data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::ListingKind;

/// Identity of a paginated item. Two items are the same item iff their ids match.
pub trait Identified {
    fn id(&self) -> i64;
    fn title(&self) -> &str;
}

/// A record served by one of the listings, with the bits the sitemap needs.
pub trait Listed: Identified {
    const KIND: ListingKind;

    fn updated_at(&self) -> &str;
    /// Image advertised for the record in sitemaps.
    fn image_url(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hackathon {
    pub id: i64,
    pub title: String,
    pub hackathon_url: String,
    pub location: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub extended_date: Option<String>,
    pub total_prize: Option<f64>,
    pub organizer_name: Option<String>,
    pub category_tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub location: String,
    pub salary_range: Option<String>,
    pub apply_url: String,
    pub job_type: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub type_name: Option<String>,
    pub price_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One selectable value of a facet (a category, a location, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetOption {
    pub id: i64,
    pub name: String,
    pub updated_at: String,
    pub created_at: String,
}

impl Identified for Hackathon {
    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl Listed for Hackathon {
    const KIND: ListingKind = ListingKind::Hackathons;

    fn updated_at(&self) -> &str {
        &self.updated_at
    }

    fn image_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
}

impl Identified for Job {
    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl Listed for Job {
    const KIND: ListingKind = ListingKind::Jobs;

    fn updated_at(&self) -> &str {
        &self.updated_at
    }

    fn image_url(&self) -> Option<&str> {
        self.company_logo.as_deref()
    }
}

impl Identified for Resource {
    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl Listed for Resource {
    const KIND: ListingKind = ListingKind::Resources;

    fn updated_at(&self) -> &str {
        &self.updated_at
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}
