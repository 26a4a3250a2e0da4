use thiserror::Error;

use crate::feed::fetcher::FetchOutcome;
use crate::storage::{Article, Feed, FeedUpdate};
use crate::util::derive_summary;

/// Feed XML could not be parsed as RSS or Atom.
#[derive(Debug, Error)]
#[error("Malformed feed payload: {0}")]
pub struct ParseError(#[from] feed_rs::parser::ParseFeedError);

/// A freshly parsed feed: metadata destined for the stored [`Feed`] record
/// plus the candidate articles.
///
/// This is the only shape that carries items; the stored record never does.
#[derive(Debug)]
pub struct ParsedFeed {
    pub update: FeedUpdate,
    pub articles: Vec<Article>,
    /// Entries dropped because they had no link (the primary dedup key)
    pub skipped: usize,
}

/// Turn a fetch outcome into a [`ParsedFeed`].
///
/// `NotModified` yields an empty article list with only `last_fetched`
/// advanced. `Updated` decodes the payload via `feed-rs` into feed metadata
/// and candidate articles, each with a deterministically derived summary.
pub fn parse_outcome(outcome: FetchOutcome, feed: &Feed) -> Result<ParsedFeed, ParseError> {
    match outcome {
        FetchOutcome::NotModified { fetched_at } => Ok(ParsedFeed {
            update: FeedUpdate::touch(fetched_at),
            articles: Vec::new(),
            skipped: 0,
        }),
        FetchOutcome::Updated {
            body,
            etag,
            last_modified,
            fetched_at,
        } => {
            let parsed = feed_rs::parser::parse(&body[..])?;

            let mut articles = Vec::with_capacity(parsed.entries.len());
            let mut skipped = 0;
            for entry in parsed.entries {
                let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                    skipped += 1;
                    continue;
                };
                let title = entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string());
                let published = entry.published.or(entry.updated);
                let body_text = entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body));
                let summary = derive_summary(body_text.as_deref(), &link, &title, published);

                articles.push(Article {
                    link,
                    summary,
                    title,
                    published,
                    feed_id: feed.id.clone(),
                });
            }

            Ok(ParsedFeed {
                update: FeedUpdate {
                    title: parsed.title.map(|t| t.content),
                    link: parsed.links.first().map(|l| l.href.clone()),
                    feed_date: parsed.updated,
                    etag,
                    last_modified,
                    last_fetched: fetched_at,
                },
                articles,
                skipped,
            })
        }
    }
}
