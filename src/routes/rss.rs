use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::db::models::BlogPost;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::store::{self, Direction, Stored};

const FEED_SIZE: usize = 50;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn render_item(base_url: &str, post: &Stored<BlogPost>) -> String {
    let post_url = format!("{}/blog/{}", base_url, post.record.slug);
    let desc = post
        .record
        .excerpt
        .as_deref()
        .or(post.record.meta_description.as_deref())
        .unwrap_or("");

    format!(
        "    <item>\n\
               <title>{}</title>\n\
               <link>{}</link>\n\
               <description>{}</description>\n\
               <pubDate>{}</pubDate>\n\
               <guid isPermaLink=\"true\">{}</guid>\n\
             </item>\n",
        escape_xml(&post.record.title),
        escape_xml(&post_url),
        escape_xml(desc),
        rfc822(&post.record.created_at),
        escape_xml(&post_url),
    )
}

/// GET /rss.xml - RSS 2.0 feed of the newest published posts
pub async fn rss_feed(State(state): State<AppState>) -> ApiResult<Response> {
    let config = &state.config;
    let base_url = config.site_url.trim_end_matches('/');

    let posts = state
        .documents
        .list_records::<BlogPost>(
            &store::Query::new()
                .filter("published", true)
                .order_by("createdAt", Direction::Desc)
                .limit(FEED_SIZE),
        )
        .await?;

    let items: String = posts.iter().map(|p| render_item(base_url, p)).collect();
    let feed_url = format!("{}/rss.xml", base_url);
    let blog_url = format!("{}/blog", base_url);

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(&config.site_title),
        escape_xml(&blog_url),
        escape_xml(&config.site_description),
        escape_xml(&feed_url),
        posts
            .first()
            .map(|p| rfc822(&p.record.created_at))
            .unwrap_or_default(),
        items,
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, stale-while-revalidate=600",
            ),
        ],
        xml,
    )
        .into_response())
}
