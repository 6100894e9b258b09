use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// The columns of a Stack Overflow post shown in listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: Option<String>,
    pub score: i64,
    pub view_count: Option<i64>,
    pub answer_count: Option<i64>,
    pub creation_date: String,
}

const SUMMARY_COLUMNS: &str = "id, title, score, view_count, answer_count, creation_date";

pub struct PostRepo {
    db: Database,
}

impl PostRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Posts whose title contains `needle`, lowest id first.
    #[instrument(skip(self))]
    pub fn search_titles(&self, needle: &str, limit: u32) -> Result<Vec<PostSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM post
                 WHERE title LIKE ?1 ESCAPE '\\'
                 ORDER BY id ASC
                 LIMIT ?2"
            ))?;
            let mut rows =
                stmt.query(rusqlite::params![row_helpers::contains_pattern(needle), limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_summary(row)?);
            }
            Ok(results)
        })
    }

    #[instrument(skip(self))]
    pub fn get(&self, id: i64) -> Result<PostSummary, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SUMMARY_COLUMNS} FROM post WHERE id = ?1"))?;
            let mut rows = stmt.query([id])?;
            match rows.next()? {
                Some(row) => row_to_summary(row),
                None => Err(StoreError::NotFound(format!("post {id}"))),
            }
        })
    }
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<PostSummary, StoreError> {
    Ok(PostSummary {
        id: row_helpers::get(row, 0, "post", "id")?,
        title: row_helpers::get_opt(row, 1, "post", "title")?,
        score: row_helpers::get(row, 2, "post", "score")?,
        view_count: row_helpers::get_opt(row, 3, "post", "view_count")?,
        answer_count: row_helpers::get_opt(row, 4, "post", "answer_count")?,
        creation_date: row_helpers::get(row, 5, "post", "creation_date")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchInserter;
    use crate::row::{Row, Value};
    use crate::schema::POST;

    fn post(id: i64, title: Option<&str>) -> Row {
        Row::new()
            .with("id", id)
            .with("post_type_id", 1)
            .with("creation_date", "2008-08-01T12:00:00")
            .with("score", id * 10)
            .with("body", "<p>body</p>")
            .with("last_activity_date", "2008-08-02T12:00:00")
            .with("comment_count", 0)
            .with("title", title)
    }

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        let mut inserter = BatchInserter::new(db.clone(), &POST, 100, true).unwrap();
        inserter.insert(post(1, Some("Deploying Django on nginx"))).unwrap();
        inserter.insert(post(2, Some("Flask vs django?"))).unwrap();
        inserter.insert(post(3, None)).unwrap();
        inserter.insert(post(4, Some("Rust lifetimes"))).unwrap();
        inserter.insert(post(5, Some("100% CPU in Django admin"))).unwrap();
        inserter
            .insert(post(6, Some("Answer")).with("view_count", 42))
            .unwrap();
        inserter.flush().unwrap();
        db
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let repo = PostRepo::new(seeded());
        let ids: Vec<i64> = repo
            .search_titles("django", 10)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[test]
    fn search_respects_limit() {
        let repo = PostRepo::new(seeded());
        let results = repo.search_titles("Django", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title.as_deref(), Some("Deploying Django on nginx"));
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let repo = PostRepo::new(seeded());
        let results = repo.search_titles("100%", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 5);
        assert!(repo.search_titles("_", 10).unwrap().is_empty());
    }

    #[test]
    fn get_reads_padded_columns_as_none() {
        let repo = PostRepo::new(seeded());
        let first = repo.get(1).unwrap();
        assert_eq!(first.score, 10);
        assert_eq!(first.view_count, None);
        let sixth = repo.get(6).unwrap();
        assert_eq!(sixth.view_count, Some(42));
    }

    #[test]
    fn get_missing_is_not_found() {
        let repo = PostRepo::new(seeded());
        assert!(matches!(repo.get(99), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn titles_without_value_never_match() {
        let db = seeded();
        let rows = db.fetch_rows(&POST, 10).unwrap();
        assert_eq!(rows[2].get("title"), Some(&Value::Null));
        let repo = PostRepo::new(db);
        assert!(repo.search_titles("", 10).unwrap().iter().all(|p| p.title.is_some()));
    }
}
