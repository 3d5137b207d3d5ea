/**
 * Site Content Routes
 * Testimonials and marketing sections (hero, services, skills, stats), each
 * with built-in content used until an override is stored
 */
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::{format_timestamp, Testimonial};
use crate::error::{ApiError, ApiResult};
use crate::routes::extract::AdminUser;
use crate::state::AppState;
use crate::store::{self, Direction, Stored};

const SECTIONS_COLLECTION: &str = "site_sections";

/// Valid section keys
const VALID_SECTIONS: &[&str] = &["hero", "services", "skills", "stats"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    Stored,
    Default,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionResponse {
    pub section: String,
    pub content: Value,
    pub source: ContentSource,
}

fn section_key(raw: &str) -> ApiResult<String> {
    let key = raw.to_lowercase();
    if !VALID_SECTIONS.contains(&key.as_str()) {
        return Err(ApiError::Invalid {
            error: "Invalid section".to_string(),
            message: format!("Valid sections: {}", VALID_SECTIONS.join(", ")),
        });
    }
    Ok(key)
}

// ============================================================================
// Static/Fallback Data
// ============================================================================

fn default_section(section: &str) -> Option<Value> {
    match section {
        "hero" => Some(json!({
            "title": "Crafting Digital Experiences That Inspire",
            "subtitle": "I design and develop modern websites and applications that help businesses grow and connect with their audience.",
            "primaryCta": { "label": "View My Work", "href": "/portfolio" },
            "secondaryCta": { "label": "Contact Me", "href": "/contact" }
        })),
        "services" => Some(json!([
            {
                "title": "Web Development",
                "description": "Custom websites built with modern frameworks like React, Next.js, and tailored to your business needs."
            },
            {
                "title": "Graphic Design",
                "description": "Stunning visuals that capture your brand's essence and speak to your target audience."
            },
            {
                "title": "Data Management",
                "description": "Organize and optimize your data with efficient database solutions and seamless integrations."
            },
            {
                "title": "Mobile Development",
                "description": "Cross-platform mobile apps that provide smooth experiences across all devices."
            },
            {
                "title": "SEO Optimization",
                "description": "Boost your site's visibility with targeted SEO strategies that drive organic traffic."
            },
            {
                "title": "Analytics & Reporting",
                "description": "Gain valuable insights with comprehensive analytics and detailed reporting."
            }
        ])),
        "skills" => Some(json!({
            "areas": [
                {
                    "title": "Frontend Development",
                    "description": "Crafting responsive and interactive user interfaces with modern frameworks and libraries."
                },
                {
                    "title": "Backend Development",
                    "description": "Building robust server-side applications and RESTful APIs with Node.js and other technologies."
                },
                {
                    "title": "Database Design",
                    "description": "Designing efficient database structures for optimal data storage and retrieval."
                },
                {
                    "title": "Mobile Development",
                    "description": "Creating cross-platform mobile applications using React Native and Flutter."
                }
            ],
            "technologies": [
                "React", "Next.js", "Node.js", "TypeScript", "JavaScript", "HTML5", "CSS3",
                "Tailwind CSS", "Firebase", "Databases", "MongoDB", "PostgreSQL", "Python",
                "Redux", "GraphQL", "GitHub", "AWS", "Docker", "Flutter", "Kotlin"
            ]
        })),
        "stats" => Some(json!([
            { "count": 120, "label": "Happy Clients" },
            { "count": 150, "label": "Projects Completed" },
            { "count": 5, "label": "Years Experience" },
            { "count": 100, "label": "Satisfaction Rate %" }
        ])),
        _ => None,
    }
}

fn default_testimonials() -> Vec<Stored<Testimonial>> {
    let entries = [
        (
            "Sarah Johnson",
            "Marketing Director at TechCorp",
            "/images/testimonials/female.jpg",
            "Working with us was an absolute pleasure. The design exceeded expectations and communication throughout the project was outstanding.",
            5,
        ),
        (
            "Michael Chen",
            "Founder of StartupHub",
            "/images/testimonials/man.jpg",
            "Impressive attention to detail and a creative approach. Our website now looks modern, professional and reflects our brand identity.",
            5,
        ),
        (
            "Emily Rodriguez",
            "E-commerce Manager",
            "/images/testimonials/avatar-3.jpg",
            "The SEO work significantly improved our search rankings, with a 200% increase in organic traffic within three months.",
            5,
        ),
        (
            "David Williams",
            "CEO of FitnessPro",
            "/images/testimonials/avatar-4.jpg",
            "Our mobile app was delivered on time and within budget, and the focus on user experience earned outstanding customer feedback.",
            4,
        ),
        (
            "Jessica Parker",
            "Art Director",
            "/images/testimonials/avatar-5.jpg",
            "The branding package was comprehensive and thoughtfully designed. Everything represents our company vision perfectly.",
            5,
        ),
    ];

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (name, position, avatar, content, rating))| Stored {
            id: format!("default-{}", i + 1),
            record: Testimonial {
                name: name.to_string(),
                position: position.to_string(),
                avatar: Some(avatar.to_string()),
                content: content.to_string(),
                rating,
                order: i as i64,
            },
        })
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/testimonials - Ordered by `order`, built-in list when none are stored
pub async fn list_testimonials(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Stored<Testimonial>>>> {
    let stored = state
        .documents
        .list_records::<Testimonial>(&store::Query::new().order_by("order", Direction::Asc))
        .await?;

    if stored.is_empty() {
        return Ok(Json(default_testimonials()));
    }
    Ok(Json(stored))
}

/// GET /api/site/{section} - Stored override, else the built-in content
pub async fn get_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> ApiResult<Json<SectionResponse>> {
    let section = section_key(&section)?;

    match state.documents.get(SECTIONS_COLLECTION, &section).await {
        Ok(Some(doc)) => {
            if let Some(content) = doc.field("content").filter(|c| !c.is_null()) {
                return Ok(Json(SectionResponse {
                    content: content.clone(),
                    section,
                    source: ContentSource::Stored,
                }));
            }
        }
        Ok(None) => {}
        Err(e) => {
            // Public pages still render from built-in content
            tracing::warn!(section = %section, "Failed to load site section: {}", e);
        }
    }

    let content = default_section(&section).ok_or(ApiError::NotFound)?;
    Ok(Json(SectionResponse {
        section,
        content,
        source: ContentSource::Default,
    }))
}

/// PATCH /api/admin/site/{section} - Upsert the override; the body is the new content
pub async fn update_section(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(content): Json<Value>,
) -> ApiResult<Json<SectionResponse>> {
    let section = section_key(&section)?;
    if content.is_null() {
        return Err(ApiError::bad_request("Content is required"));
    }

    state
        .documents
        .insert(
            SECTIONS_COLLECTION,
            Some(&section),
            json!({
                "content": content.clone(),
                "updatedAt": format_timestamp(&Utc::now()),
            }),
        )
        .await?;
    tracing::info!(section = %section, "Site section updated");

    Ok(Json(SectionResponse {
        section,
        content,
        source: ContentSource::Stored,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::{app, get_json, send};
    use crate::state::test_support::test_state;
    use crate::store::DocumentStore;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_testimonials_fall_back_when_empty() {
        let ts = test_state();
        let (status, list) = get_json(app(ts.state), "/api/testimonials").await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 5);
        assert_eq!(list[0]["id"], "default-1");
        assert!(list.iter().all(|t| (1..=5).contains(&t["rating"].as_u64().unwrap())));
    }

    #[tokio::test]
    async fn test_stored_testimonials_are_ordered() {
        let ts = test_state();
        for (name, order) in [("Late", 2), ("Early", 0)] {
            ts.documents
                .insert(
                    "testimonials",
                    None,
                    json!({
                        "name": name,
                        "position": "Client",
                        "content": "Great",
                        "rating": 5,
                        "order": order
                    }),
                )
                .await
                .unwrap();
        }

        let (_, list) = get_json(app(ts.state), "/api/testimonials").await;
        let names: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }

    #[tokio::test]
    async fn test_section_override_wins_over_default() {
        let ts = test_state();
        let (status, body) = get_json(app(ts.state.clone()), "/api/site/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "default");
        assert_eq!(body["content"][0]["label"], "Happy Clients");

        let (status, _) = send(
            app(ts.state.clone()),
            "PATCH",
            "/api/admin/site/STATS",
            Some(json!([{ "count": 7, "label": "Launches" }])),
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(app(ts.state), "/api/site/stats").await;
        assert_eq!(body["source"], "stored");
        assert_eq!(body["content"], json!([{ "count": 7, "label": "Launches" }]));
    }

    #[tokio::test]
    async fn test_unknown_section_rejected() {
        let ts = test_state();
        let (status, body) = get_json(app(ts.state.clone()), "/api/site/pricing").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid section");

        let (status, _) = send(
            app(ts.state),
            "PATCH",
            "/api/admin/site/hero",
            Some(json!({ "title": "x" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
