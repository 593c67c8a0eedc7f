// ── Scrapers ───────────────────────────────────────────────────────────────
// Scheduled producers that feed the news and wiki tables. Parsing is pure
// (HTML string in, rows out) so the heuristics are testable without a
// network; fetching goes through the Retry Fetcher. Selector sets are
// probed in order and a site that yields nothing is logged, never fatal —
// the sites are unversioned and shift layout without notice.

use log::{info, warn};

use crate::atoms::error::CoreResult;
use crate::fetch::Fetcher;
use crate::store::{news, wiki, ConnectionPool};

pub mod news_parse;
pub mod wiki_parse;

// ── Source catalogue ───────────────────────────────────────────────────────

pub const HOLOLIVE_NEWS_URL: &str = "https://hololive.hololivepro.com/news/";
pub const HOLOLIVE_TALENTS_URL: &str = "https://hololive.hololivepro.com/talents/";

pub struct SpecializedSite {
    pub name: &'static str,
    pub base_url: &'static str,
}

/// Partitions of the specialised-news table, one scrape worker each.
pub const SPECIALIZED_SITES: &[SpecializedSite] = &[
    SpecializedSite { name: "Blender", base_url: "https://docs.blender.org/manual/ja/latest/" },
    SpecializedSite { name: "CGニュース", base_url: "https://modelinghappy.com/" },
    SpecializedSite { name: "脳科学・心理学", base_url: "https://nazology.kusuguru.co.jp/" },
    SpecializedSite { name: "セカンドライフ", base_url: "https://community.secondlife.com/news/" },
    SpecializedSite { name: "アニメ", base_url: "https://animedb.jp/" },
];

// ── Refresh jobs ───────────────────────────────────────────────────────────

/// Fetch and ingest the primary news source. Returns newly inserted rows.
pub async fn refresh_hololive_news(fetcher: &Fetcher, pool: &ConnectionPool) -> CoreResult<usize> {
    let Some(html) = fetcher.fetch_text(HOLOLIVE_NEWS_URL).await else {
        warn!("[scrape] Primary news source unreachable, skipping refresh");
        return Ok(0);
    };

    let articles = news_parse::parse_articles(&html, HOLOLIVE_NEWS_URL);
    let mut inserted = 0;
    for article in &articles {
        if news::insert_hololive(pool, article)? {
            inserted += 1;
        }
    }
    info!("[scrape] Hololive news: {} scraped, {} new", articles.len(), inserted);
    Ok(inserted)
}

/// Fetch and ingest one specialised site partition.
pub async fn refresh_specialized_site(
    fetcher: &Fetcher,
    pool: &ConnectionPool,
    site: &SpecializedSite,
) -> CoreResult<usize> {
    let Some(html) = fetcher.fetch_text(site.base_url).await else {
        warn!("[scrape] Site '{}' unreachable, skipping", site.name);
        return Ok(0);
    };

    let articles = news_parse::parse_articles(&html, site.base_url);
    let mut inserted = 0;
    for article in &articles {
        if news::insert_specialized(pool, site.name, article)? {
            inserted += 1;
        }
    }
    info!("[scrape] {}: {} scraped, {} new", site.name, articles.len(), inserted);
    Ok(inserted)
}

/// Refresh every specialised site, one concurrent worker per site.
/// Individual failures are logged and do not abort the batch.
pub async fn refresh_all_specialized(fetcher: &Fetcher, pool: &ConnectionPool) -> usize {
    let jobs = SPECIALIZED_SITES
        .iter()
        .map(|site| refresh_specialized_site(fetcher, pool, site));
    let results = futures::future::join_all(jobs).await;

    let mut total = 0;
    for (site, result) in SPECIALIZED_SITES.iter().zip(results) {
        match result {
            Ok(inserted) => total += inserted,
            Err(e) => warn!("[scrape] '{}' refresh failed: {}", site.name, e),
        }
    }
    total
}

/// One full wiki scan: upsert every member seen on the source site, then
/// reconcile — absent members flip inactive unless graduated.
pub async fn scan_wiki(fetcher: &Fetcher, pool: &ConnectionPool) -> CoreResult<usize> {
    let Some(html) = fetcher.fetch_text(HOLOLIVE_TALENTS_URL).await else {
        warn!("[scrape] Talent site unreachable, skipping wiki scan");
        return Ok(0);
    };

    let members = wiki_parse::parse_members(&html);
    if members.is_empty() {
        // A layout change that hides every member must not deactivate the
        // whole catalogue.
        warn!("[scrape] Wiki scan yielded zero members — skipping reconciliation");
        return Ok(0);
    }

    for member in &members {
        wiki::upsert_member(pool, member)?;
    }
    let seen: Vec<String> = members.iter().map(|m| m.member_name.clone()).collect();
    let deactivated = wiki::reconcile_absent(pool, &seen)?;
    info!(
        "[scrape] Wiki scan: {} members seen, {} deactivated",
        members.len(),
        deactivated
    );
    Ok(members.len())
}
