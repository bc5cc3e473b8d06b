use regex::{Regex, RegexSet};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::ExtractSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("invalid {field} selector {selector:?}: {message}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        message: String,
    },
    #[error("invalid title pattern {pattern:?}: {message}")]
    InvalidTitlePattern { pattern: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    /// Raw timestamp text as shown on the page.
    pub published: Option<String>,
    pub content: Option<String>,
}

/// Pulls article fields out of a fetched page.
pub trait ArticleExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<ExtractedArticle>;
}

/// Extractor driven by configurable CSS selectors:
/// - every element matching `article_selector` is one candidate
/// - the first `title_selector` match inside it is the title; candidates without one are skipped
/// - the first `timestamp_selector` match is the raw publish time
/// - all `paragraph_selector` matches, space-joined, are the content.
#[derive(Debug)]
pub struct SelectorExtractor {
    article: Selector,
    title: Selector,
    timestamp: Selector,
    paragraph: Selector,
}

impl SelectorExtractor {
    pub fn new(settings: &ExtractSettings) -> Result<Self, ExtractError> {
        Ok(Self {
            article: parse_selector("article", &settings.article_selector)?,
            title: parse_selector("title", &settings.title_selector)?,
            timestamp: parse_selector("timestamp", &settings.timestamp_selector)?,
            paragraph: parse_selector("paragraph", &settings.paragraph_selector)?,
        })
    }
}

fn parse_selector(field: &'static str, selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
        field,
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

impl ArticleExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Vec<ExtractedArticle> {
        let doc = Html::parse_document(html);
        doc.select(&self.article)
            .filter_map(|article| {
                let title = article
                    .select(&self.title)
                    .next()
                    .map(element_text)
                    .filter(|t| !t.is_empty())?;
                let published = article
                    .select(&self.timestamp)
                    .next()
                    .map(element_text)
                    .filter(|t| !t.is_empty());
                let content = article
                    .select(&self.paragraph)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(ExtractedArticle {
                    title,
                    published,
                    content: (!content.is_empty()).then_some(content),
                })
            })
            .collect()
    }
}

/// Drops titles matching any configured pattern. Matching is unanchored and
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct TitleFilter {
    patterns: RegexSet,
}

impl TitleFilter {
    pub fn new(patterns: &[String]) -> Result<Self, ExtractError> {
        for pattern in patterns {
            Regex::new(pattern).map_err(|err| ExtractError::InvalidTitlePattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
        }
        let patterns = RegexSet::new(patterns).map_err(|err| ExtractError::InvalidTitlePattern {
            pattern: patterns.join(" | "),
            message: err.to_string(),
        })?;
        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, title: &str) -> bool {
        self.patterns.is_match(title)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
