//! CMS records stored in the document store (serialized with serde, camelCase fields).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// RFC 3339 UTC with fixed microsecond precision, so string order equals time order.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Trim entries, drop empty ones and keep the first occurrence of each.
pub fn normalize_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub seo_optimized: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Record for BlogPost {
    const COLLECTION: &'static str = "blog";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortfolioCategory {
    Web,
    Mobile,
    Design,
    Branding,
    Graphic,
    Data,
    Ai,
    Blockchain,
    Iot,
    Game,
    Other,
}

impl PortfolioCategory {
    pub const ALL: [PortfolioCategory; 11] = [
        PortfolioCategory::Web,
        PortfolioCategory::Mobile,
        PortfolioCategory::Design,
        PortfolioCategory::Branding,
        PortfolioCategory::Graphic,
        PortfolioCategory::Data,
        PortfolioCategory::Ai,
        PortfolioCategory::Blockchain,
        PortfolioCategory::Iot,
        PortfolioCategory::Game,
        PortfolioCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioCategory::Web => "web",
            PortfolioCategory::Mobile => "mobile",
            PortfolioCategory::Design => "design",
            PortfolioCategory::Branding => "branding",
            PortfolioCategory::Graphic => "graphic",
            PortfolioCategory::Data => "data",
            PortfolioCategory::Ai => "ai",
            PortfolioCategory::Blockchain => "blockchain",
            PortfolioCategory::Iot => "iot",
            PortfolioCategory::Game => "game",
            PortfolioCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PortfolioCategory::Web => "Web Development",
            PortfolioCategory::Mobile => "Mobile App",
            PortfolioCategory::Design => "UI/UX Design",
            PortfolioCategory::Branding => "Branding",
            PortfolioCategory::Graphic => "Graphic Design",
            PortfolioCategory::Data => "Data Science",
            PortfolioCategory::Ai => "Artificial Intelligence",
            PortfolioCategory::Blockchain => "Blockchain",
            PortfolioCategory::Iot => "Internet of Things",
            PortfolioCategory::Game => "Game Development",
            PortfolioCategory::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Portfolio item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<PortfolioCategory>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Record for PortfolioItem {
    const COLLECTION: &'static str = "portfolio";
}

/// Partner shown in the logo strip, sorted by `order`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Record for Partner {
    const COLLECTION: &'static str = "partners";
}

/// Contact message. The same shape is written to both message stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub ip: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

fn default_source() -> String {
    "website".to_string()
}

impl Record for Message {
    const COLLECTION: &'static str = "messages";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub content: String,
    pub rating: u8,
    #[serde(default)]
    pub order: i64,
}

impl Record for Testimonial {
    const COLLECTION: &'static str = "testimonials";
}

/// Stored admin credential. Overrides the environment once a password change happens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredential {
    pub email: String,
    pub password_hash: String,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl AdminCredential {
    pub const DOCUMENT_ID: &'static str = "admin_credentials";
}

impl Record for AdminCredential {
    const COLLECTION: &'static str = "settings";
}
