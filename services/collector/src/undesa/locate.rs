//! Finds the "destination and origin" data file by crawling the UN DESA pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use store::schema::fold_text;
use tracing::{debug, info, warn};

use crate::fetch::Fetch;

/// Phrase that identifies the origin/destination matrix among the downloads.
pub const WANTED_PHRASE: &str = "destination and origin";

const DATA_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".zip", ".csv"];

const FOLLOW_KEYWORDS: &[&str] = &["data", "international migrant stock", "destination", "origin"];

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))[^>]*>(.*?)</a\s*>"#)
        .expect("anchor pattern")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"20\d{2}").expect("year pattern"));

static SKIP_FOLLOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(pdf|xlsx|xls|zip|csv)$").expect("extension pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

fn unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
}

/// Every `<a href>` in the page with its visible text.
pub fn extract_anchors(html: &str) -> Vec<Anchor> {
    ANCHOR_RE
        .captures_iter(html)
        .filter_map(|c| {
            let href = c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3))?.as_str().trim();
            if href.is_empty() {
                return None;
            }
            let text = TAG_RE.replace_all(&c[4], " ");
            Some(Anchor {
                href: unescape(href),
                text: unescape(text.split_whitespace().collect::<Vec<_>>().join(" ").as_str()),
            })
        })
        .collect()
}

fn path_of(href: &str) -> &str {
    href.split(['?', '#']).next().unwrap_or(href)
}

pub fn is_data_file(href: &str) -> bool {
    let path = path_of(href).to_lowercase();
    DATA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

pub fn score_link(text: &str, href: &str) -> i32 {
    let t = fold_text(&format!("{} {}", text, href));
    let mut score = 0;
    let has_phrase = t.contains(WANTED_PHRASE);
    if has_phrase {
        score += 80;
    }
    if t.contains("destination") && t.contains("origin") {
        score += 10;
    }
    if t.contains("sex") && !has_phrase {
        score -= 50;
    }
    if t.contains("total") && !has_phrase {
        score -= 50;
    }
    if is_data_file(href) {
        score += 15;
    }
    if let Some(year) = YEAR_RE.find(&t).and_then(|m| m.as_str().parse::<i32>().ok()) {
        score += year - 1990;
    }
    score
}

fn should_follow(text: &str, href: &str) -> bool {
    let t = fold_text(text);
    FOLLOW_KEYWORDS.iter().any(|k| t.contains(k)) && !SKIP_FOLLOW_RE.is_match(path_of(href))
}

#[derive(Debug, Clone)]
struct Candidate {
    score: i32,
    url: String,
    text: String,
}

impl Candidate {
    fn is_data_file(&self) -> bool {
        is_data_file(&self.url)
    }

    fn names_matrix(&self) -> bool {
        fold_text(&self.text).contains(WANTED_PHRASE)
    }
}

/// Breadth-first crawl from `start_url`, at most `max_depth` levels below it.
///
/// Returns as soon as the best-scoring link so far is a data file whose text
/// names the origin/destination matrix; after the crawl, settles for the best
/// data file that is not a "total" table.
pub async fn find_download_url<F: Fetch>(fetcher: &F, start_url: &str, max_depth: usize) -> Option<String> {
    let mut visited: HashSet<String> = HashSet::from([start_url.to_string()]);
    let mut frontier = vec![start_url.to_string()];
    let mut best: Option<Candidate> = None;

    let mut depth = 0;
    while !frontier.is_empty() && depth <= max_depth {
        let mut next = Vec::new();
        for page in &frontier {
            let Ok(base) = Url::parse(page) else {
                warn!(page = %page, "skipping unparsable page URL");
                continue;
            };
            let html = match fetcher.fetch(page).await {
                Ok(body) => String::from_utf8_lossy(&body).into_owned(),
                Err(e) => {
                    warn!(page = %page, error = %e, "page fetch failed");
                    continue;
                }
            };
            let anchors = extract_anchors(&html);
            debug!(page = %page, depth, anchors = anchors.len(), "scanned page");

            for anchor in anchors {
                let Ok(abs) = base.join(&anchor.href) else {
                    continue;
                };
                let score = score_link(&anchor.text, &anchor.href);
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(Candidate {
                        score,
                        url: abs.to_string(),
                        text: anchor.text.clone(),
                    });
                }
                if matches!(abs.scheme(), "http" | "https")
                    && should_follow(&anchor.text, &anchor.href)
                    && visited.insert(abs.to_string())
                {
                    next.push(abs.to_string());
                }
            }
        }

        if let Some(b) = best.as_ref().filter(|b| b.is_data_file() && b.names_matrix()) {
            info!(url = %b.url, score = b.score, depth, "found destination/origin file");
            return Some(b.url.clone());
        }
        frontier = next;
        depth += 1;
    }

    best.filter(|b| b.is_data_file() && !fold_text(&b.text).contains("total"))
        .map(|b| {
            info!(url = %b.url, score = b.score, "settling for best data file");
            b.url
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MapFetcher;

    const BASE: &str = "https://www.un.org/development/desa/pd/content/international-migrant-stock";

    #[test]
    fn test_extract_anchors() {
        let html = r#"<p><a class="x" href="/files/a.xlsx">International migrant stock <b>2020</b>:
            Destination &amp; origin</a> and <A HREF='page?id=1&amp;x=2'>Data</A></p>"#;
        let anchors = extract_anchors(html);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].href, "/files/a.xlsx");
        assert_eq!(anchors[0].text, "International migrant stock 2020 : Destination & origin");
        assert_eq!(anchors[1].href, "page?id=1&x=2");
    }

    #[test]
    fn test_extract_anchors_attribute_shapes() {
        let prefixed = extract_anchors(
            r#"<a data-href="/tracking" href="/files/ims_2020_destination_and_origin.xlsx">Destination and origin 2020</a>"#,
        );
        assert_eq!(prefixed.len(), 1);
        assert_eq!(prefixed[0].href, "/files/ims_2020_destination_and_origin.xlsx");

        let unquoted = extract_anchors(
            "<a href=/files/ims_2020_destination_and_origin.xlsx>Destination and origin 2020</a>\
             <a class=nav href=data.html target=_blank>Data</a>\
             <a data-href=\"/only-tracking\">Not a link</a>\
             <a href=\"\">Empty</a>",
        );
        assert_eq!(unquoted.len(), 2);
        assert_eq!(unquoted[0].href, "/files/ims_2020_destination_and_origin.xlsx");
        assert_eq!(unquoted[0].text, "Destination and origin 2020");
        assert_eq!(unquoted[1].href, "data.html");
    }

    #[test]
    fn test_score_prefers_recent_matrix_file() {
        let matrix = score_link(
            "International migrant stock 2020: destination and origin",
            "/files/undesa_pd_2020_ims_stock_by_sex_destination_and_origin.xlsx",
        );
        let by_sex = score_link("International migrant stock 2020: by sex", "/files/by_sex_2020.xlsx");
        let total = score_link("Total migrant stock 2019", "/files/total_2019.xlsx");
        let older = score_link("Migrant stock 2015: destination and origin", "/files/ims2015.xlsx");

        assert_eq!(matrix, 80 + 10 + 15 + 30);
        assert!(matrix > older);
        assert!(by_sex < 0);
        assert!(total < 0);
    }

    #[test]
    fn test_score_is_accent_insensitive() {
        assert_eq!(
            score_link("DESTINATION  and   ORÍGIN", "/x"),
            score_link("destination and origin", "/x")
        );
    }

    #[test]
    fn test_follow_rules() {
        assert!(should_follow("Data", "/data/page"));
        assert!(should_follow("International Migrant Stock", "/ims"));
        assert!(!should_follow("Data", "/data/file.pdf"));
        assert!(!should_follow("Report", "/report"));
    }

    #[tokio::test]
    async fn test_crawl_finds_file_one_level_down() {
        let landing = r#"<a href="/about">About us</a>
            <a href="/development/desa/pd/data/ims">International Migrant Stock data</a>
            <a href="/files/total_2020.xlsx">Total migrant stock 2020</a>"#;
        let data_page = r#"<a href="/files/ims_2020_destination_and_origin.xlsx">Destination and origin (2020)</a>
            <a href="/files/ims_2020_by_sex.xlsx">By sex 2020</a>"#;
        let fetcher = MapFetcher::default()
            .with(BASE, landing)
            .with("https://www.un.org/development/desa/pd/data/ims", data_page);

        let url = find_download_url(&fetcher, BASE, 2).await;
        assert_eq!(
            url.as_deref(),
            Some("https://www.un.org/files/ims_2020_destination_and_origin.xlsx")
        );
        assert!(!fetcher.requested().iter().any(|u| u.contains("about")));
    }

    #[tokio::test]
    async fn test_crawl_respects_depth() {
        let landing = r#"<a href="/data/one">Data</a>"#;
        let one = r#"<a href="/data/two">More data</a>"#;
        let two = r#"<a href="/files/destination_and_origin.xlsx">Destination and origin 2020</a>"#;
        let fetcher = MapFetcher::default()
            .with(BASE, landing)
            .with("https://www.un.org/data/one", one)
            .with("https://www.un.org/data/two", two);

        assert_eq!(find_download_url(&fetcher, BASE, 1).await, None);
        assert!(find_download_url(&fetcher, BASE, 2).await.is_some());
    }

    #[tokio::test]
    async fn test_fallback_skips_total_tables() {
        let landing = r#"<a href="/files/stock_2020.xlsx">Migrant stock 2020</a>
            <a href="/files/total_2024.xlsx">Total 2024</a>"#;
        let fetcher = MapFetcher::default().with(BASE, landing);
        assert_eq!(
            find_download_url(&fetcher, BASE, 0).await.as_deref(),
            Some("https://www.un.org/files/stock_2020.xlsx")
        );
    }

    #[tokio::test]
    async fn test_unreachable_landing_page() {
        let fetcher = MapFetcher::default().failing(BASE, false);
        assert_eq!(find_download_url(&fetcher, BASE, 2).await, None);
    }
}
