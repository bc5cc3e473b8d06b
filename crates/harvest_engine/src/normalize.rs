use std::collections::HashSet;

use chrono::NaiveDateTime;
use engine_logging::engine_debug;
use harvest_core::{
    composite_id, Cell, Record, RowView, Snapshot, SnapshotError, Tabular, NORMALIZED_ID_LEN,
};

use crate::extract::{ArticleExtractor, TitleFilter};

/// Key column of normalized snapshots.
pub const ARTICLE_KEY: &str = "id";

const ARTICLE_COLUMNS: &[&str] = &["id", "entity", "published_at", "title", "content"];
const PUBLISHED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalized row, keyed by a hash of entity, publish time and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub entity: String,
    pub published_at: Option<String>,
    pub title: String,
    pub content: Option<String>,
}

impl Article {
    pub fn new(
        entity: String,
        published_at: Option<String>,
        title: String,
        content: Option<String>,
    ) -> Self {
        let id = composite_id(
            &[
                entity.as_str(),
                published_at.as_deref().unwrap_or(""),
                title.as_str(),
            ],
            NORMALIZED_ID_LEN,
        );
        Self {
            id,
            entity,
            published_at,
            title,
            content,
        }
    }
}

impl Tabular for Article {
    fn columns() -> &'static [&'static str] {
        ARTICLE_COLUMNS
    }

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.id.as_str()),
            Cell::from(self.entity.as_str()),
            Cell::from(self.published_at.clone()),
            Cell::from(self.title.as_str()),
            Cell::from(self.content.clone()),
        ]
    }

    fn from_row(row: RowView<'_>) -> Result<Self, SnapshotError> {
        Ok(Self {
            id: row.text("id")?.to_string(),
            entity: row.text("entity")?.to_string(),
            published_at: row.opt_text("published_at")?.map(str::to_string),
            title: row.text("title")?.to_string(),
            content: row.opt_text("content")?.map(str::to_string),
        })
    }
}

/// Parses `published at 22:46 2 October`. The page omits the year, so the
/// caller supplies it; an explicit trailing year is honoured.
pub fn parse_published_date(raw: &str, year: i32) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let text = trimmed
        .strip_prefix("published at")
        .or_else(|| trimmed.strip_prefix("Published at"))
        .unwrap_or(trimmed);
    let parts: Vec<&str> = text.split_whitespace().collect();
    let (time, day, month, year_text) = match parts.as_slice() {
        [time, day, month] => (*time, *day, *month, year.to_string()),
        [time, day, month, explicit] => (*time, *day, *month, explicit.to_string()),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&format!("{time} {day} {month} {year_text}"), "%H:%M %d %B %Y").ok()
}

/// Turns raw record snapshots into deduplicated article rows.
///
/// Pages that yield no titled article (including failure placeholders)
/// contribute nothing. Titles rejected by `title_filter` are dropped. The
/// first occurrence of an id wins.
pub fn normalize(
    raw: &Snapshot,
    extractor: &dyn ArticleExtractor,
    year: i32,
    title_filter: &TitleFilter,
) -> Result<Snapshot, SnapshotError> {
    let records: Vec<Record> = raw.decode_rows()?;

    let mut seen = HashSet::new();
    let mut articles = Vec::new();
    let mut filtered = 0usize;
    for record in &records {
        for extracted in extractor.extract(&record.payload) {
            if title_filter.is_excluded(&extracted.title) {
                filtered += 1;
                continue;
            }
            let published_at = extracted
                .published
                .as_deref()
                .and_then(|p| parse_published_date(p, year))
                .map(|dt| dt.format(PUBLISHED_FORMAT).to_string());
            let article = Article::new(
                record.entity.clone(),
                published_at,
                extracted.title,
                extracted.content,
            );
            if seen.insert(article.id.clone()) {
                articles.push(article);
            }
        }
    }

    engine_debug!(
        "normalized {} records into {} articles ({} filtered by title)",
        records.len(),
        articles.len(),
        filtered
    );
    Ok(Snapshot::from_rows(&articles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractSettings;
    use crate::extract::ExtractedArticle;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use harvest_core::{FetchOutcome, FetchStatus, RecordBuilder};

    /// Treats every payload line as one article title.
    struct LineExtractor;

    impl ArticleExtractor for LineExtractor {
        fn extract(&self, html: &str) -> Vec<ExtractedArticle> {
            html.lines()
                .map(|title| ExtractedArticle {
                    title: title.to_string(),
                    published: None,
                    content: None,
                })
                .collect()
        }
    }

    fn raw_snapshot(payloads: &[&str]) -> Snapshot {
        let builder = RecordBuilder::new(Utc.with_ymd_and_hms(2024, 10, 2, 0, 0, 0).unwrap());
        let records: Vec<Record> = payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| {
                builder.build(FetchOutcome {
                    entity: "Arsenal".into(),
                    page: i as u32 + 1,
                    attempts: 1,
                    status: FetchStatus::Success(payload.to_string()),
                })
            })
            .collect();
        Snapshot::from_rows(&records)
    }

    #[test]
    fn live_blog_titles_are_filtered_out() {
        let raw = raw_snapshot(&[
            "Follow Arsenal v Chelsea live\nArsenal sign new goalkeeper",
            "Follow Saturday's Premier League games",
        ]);
        let filter = TitleFilter::new(&ExtractSettings::default().excluded_title_patterns).unwrap();

        let articles: Vec<Article> = normalize(&raw, &LineExtractor, 2024, &filter)
            .unwrap()
            .decode_rows()
            .unwrap();

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Arsenal sign new goalkeeper"]);
    }

    #[test]
    fn repeated_articles_collapse_to_one_row() {
        let raw = raw_snapshot(&["Arsenal win\nArsenal win", "Arsenal win"]);
        let filter = TitleFilter::new(&[]).unwrap();
        let normalized = normalize(&raw, &LineExtractor, 2024, &filter).unwrap();
        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn parses_page_timestamp_with_supplied_year() {
        let parsed = parse_published_date("published at 22:46 2 October", 2024).unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 10, 2)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(22, 46, 0).unwrap())
        );
    }

    #[test]
    fn explicit_year_wins() {
        let parsed = parse_published_date("09:05 14 March 2023", 2024).unwrap();
        assert_eq!(parsed.format(PUBLISHED_FORMAT).to_string(), "2023-03-14 09:05:00");
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_published_date("yesterday", 2024), None);
        assert_eq!(parse_published_date("published at 25:99 40 Smarch", 2024), None);
    }

    #[test]
    fn article_id_depends_on_identity_fields_only() {
        let a = Article::new("A".into(), None, "T".into(), Some("x".into()));
        let b = Article::new("A".into(), None, "T".into(), Some("y".into()));
        let c = Article::new("B".into(), None, "T".into(), None);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), NORMALIZED_ID_LEN);
    }
}
