use tracing::debug;

use super::store::SnapshotStore;
use super::types::{Article, DuplicateKey, InsertOutcome};

// ============================================================================
// Article Operations
// ============================================================================

impl SnapshotStore {
    /// Attempt to insert one article, enforcing both uniqueness invariants.
    ///
    /// The link index is checked first, then the summary index; the record
    /// and both indices are only touched once neither key collides, so a
    /// duplicate never leaves partial state behind.
    pub fn insert_article(&mut self, article: Article) -> InsertOutcome {
        if self.articles_by_link.contains_key(&article.link) {
            return InsertOutcome::Duplicate(DuplicateKey::Link);
        }
        if self.articles_by_summary.contains_key(&article.summary) {
            return InsertOutcome::Duplicate(DuplicateKey::Summary);
        }

        let pos = self.articles.len();
        self.articles_by_link.insert(article.link.clone(), pos);
        self.articles_by_summary
            .insert(article.summary.clone(), pos);
        self.articles.push(article);
        InsertOutcome::Inserted
    }

    /// Insert each candidate that does not already exist, in input order.
    ///
    /// Returns the subsequence actually inserted. Duplicates are skipped
    /// silently - an expected outcome, not a failure. Existing articles are
    /// never updated on conflict (insert-only semantics).
    pub fn insert_if_new(&mut self, candidates: Vec<Article>) -> Vec<Article> {
        let mut inserted = Vec::new();
        for article in candidates {
            match self.insert_article(article.clone()) {
                InsertOutcome::Inserted => inserted.push(article),
                InsertOutcome::Duplicate(key) => {
                    debug!(link = %article.link, key = ?key, "skipping duplicate article");
                }
            }
        }
        inserted
    }

    /// Point lookup by the unique link key.
    pub fn article_by_link(&self, link: &str) -> Option<&Article> {
        self.articles_by_link
            .get(link)
            .map(|&pos| &self.articles[pos])
    }

    /// Up to `limit` articles sorted by `published` descending; undated
    /// articles sort last.
    pub fn recent_articles(&self, limit: usize) -> Vec<Article> {
        let mut sorted: Vec<&Article> = self.articles.iter().collect();
        sorted.sort_by(|a, b| b.published.cmp(&a.published));
        sorted.into_iter().take(limit).cloned().collect()
    }
}
