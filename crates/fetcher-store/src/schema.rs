//! Table descriptors for the fetcher database.
//!
//! Every table gets an implicit `id INTEGER PRIMARY KEY`. Foreign-key columns
//! are named after the field with an `_id` suffix. DDL is generated from the
//! descriptors, so creating tables is idempotent.

use std::fmt::Write as _;

pub const SCHEMA_VERSION: u32 = 1;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

const CREATE_SCHEMA_VERSION: &str =
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    /// Bounded string; 255 unless a length is given.
    Char(u16),
    Text,
    DateTime,
    Boolean,
}

impl ColumnType {
    fn sql(self) -> String {
        match self {
            Self::Integer | Self::Boolean => "INTEGER".into(),
            Self::Char(len) => format!("VARCHAR({len})"),
            Self::Text => "TEXT".into(),
            Self::DateTime => "DATETIME".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
    pub indexed: bool,
    pub default_now: bool,
    pub references: Option<&'static str>,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            indexed: false,
            default_now: false,
            references: None,
        }
    }

    pub const fn null(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn index(self) -> Self {
        Self {
            indexed: true,
            ..self
        }
    }

    pub const fn default_now(self) -> Self {
        Self {
            default_now: true,
            ..self
        }
    }

    /// Integer column referencing `table(id)`.
    pub const fn foreign_key(name: &'static str, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..Self::new(name, ColumnType::Integer)
        }
    }

    fn definition(&self) -> String {
        let mut def = format!("\"{}\" {}", self.name, self.kind.sql());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.default_now {
            def.push_str(" DEFAULT CURRENT_TIMESTAMP");
        }
        if let Some(target) = self.references {
            let _ = write!(def, " REFERENCES \"{target}\"(id)");
        }
        def
    }
}

/// A destination table and the fields it accepts.
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a row may carry `field`. The primary key is always accepted.
    pub fn accepts(&self, field: &str) -> bool {
        field == "id" || self.column(field).is_some()
    }

    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    id INTEGER PRIMARY KEY",
            self.name
        );
        for column in self.columns {
            let _ = write!(sql, ",\n    {}", column.definition());
        }
        sql.push_str("\n);\n");
        for column in self.columns.iter().filter(|c| c.indexed) {
            let _ = writeln!(
                sql,
                "CREATE INDEX IF NOT EXISTS \"idx_{table}_{col}\" ON \"{table}\"(\"{col}\");",
                table = self.name,
                col = column.name,
            );
        }
        sql
    }
}

/// DDL for every table plus the schema version table.
pub fn create_tables_sql() -> String {
    let mut sql = String::new();
    for table in TABLES {
        sql.push_str(&table.create_sql());
    }
    sql.push_str(CREATE_SCHEMA_VERSION);
    sql
}

/// Look up a table descriptor by name.
pub fn table(name: &str) -> Option<&'static Table> {
    TABLES.iter().copied().find(|t| t.name == name)
}

use ColumnType::{Boolean, Char, DateTime, Integer, Text};

const fn fetch_index() -> Column {
    Column::new("fetch_index", Integer).index()
}

const fn compute_index() -> Column {
    Column::new("compute_index", Integer).index()
}

const fn date() -> Column {
    Column::new("date", DateTime).index().default_now()
}

// Query expansion

pub static SEED: Table = Table {
    name: "seed",
    columns: &[
        fetch_index(),
        date(),
        Column::foreign_key("parent_id", "seed").null(),
        Column::new("seed", Char(255)),
        Column::new("depth", Integer),
    ],
};

pub static QUERY: Table = Table {
    name: "query",
    columns: &[
        fetch_index(),
        date(),
        Column::foreign_key("seed_id", "seed"),
        Column::new("query", Char(255)),
        Column::new("depth", Integer),
        Column::new("rank", Integer),
    ],
};

// Search engines

pub static SEARCH: Table = Table {
    name: "search",
    columns: &[
        fetch_index(),
        date(),
        Column::new("query", Char(255)),
        Column::new("page_index", Integer),
        Column::new("requested_count", Integer),
        Column::new("result_count_on_page", Integer),
        Column::new("estimated_results_count", Integer),
        Column::new("package", Text).index().null(),
    ],
};

pub static SEARCH_RESULT: Table = Table {
    name: "searchresult",
    columns: &[
        Column::foreign_key("search_id", "search"),
        Column::new("title", Text),
        Column::new("snippet", Text).null(),
        Column::new("link", Char(255)),
        Column::new("url", Char(255)).index(),
        Column::new("updated_date", DateTime),
        Column::new("rank", Integer),
    ],
};

pub static WEB_PAGE_CONTENT: Table = Table {
    name: "webpagecontent",
    columns: &[
        date(),
        Column::new("url", Text).index(),
        Column::new("content", Text),
    ],
};

pub static SEARCH_RESULT_CONTENT: Table = Table {
    name: "searchresultcontent",
    columns: &[
        Column::foreign_key("search_result_id", "searchresult"),
        Column::foreign_key("content_id", "webpagecontent"),
    ],
};

pub static CODE: Table = Table {
    name: "code",
    columns: &[
        date(),
        compute_index(),
        Column::foreign_key("web_page_id", "webpagecontent"),
        Column::new("code", Text),
    ],
};

/// Wayback Machine CDX captures of a URL.
pub static WEB_PAGE_VERSION: Table = Table {
    name: "webpageversion",
    columns: &[
        fetch_index(),
        date(),
        Column::new("url", Text).index(),
        Column::new("url_key", Text),
        Column::new("timestamp", DateTime).index(),
        Column::new("original", Text),
        Column::new("mime_type", Text),
        // text: the CDX API reports "-" for some captures
        Column::new("status_code", Text).index(),
        Column::new("digest", Text).index(),
        Column::new("length", Integer).null(),
    ],
};

// Stack Overflow API snapshots

pub static QUESTION_SNAPSHOT: Table = Table {
    name: "questionsnapshot",
    columns: &[
        fetch_index(),
        date(),
        Column::new("question_id", Integer).index(),
        Column::new("owner_id", Integer).null(),
        Column::new("comment_count", Integer),
        Column::new("delete_vote_count", Integer),
        Column::new("reopen_vote_count", Integer),
        Column::new("close_vote_count", Integer),
        Column::new("is_answered", Boolean),
        Column::new("view_count", Integer),
        Column::new("favorite_count", Integer),
        Column::new("down_vote_count", Integer),
        Column::new("up_vote_count", Integer),
        Column::new("answer_count", Integer),
        Column::new("score", Integer),
        Column::new("last_activity_date", DateTime),
        Column::new("creation_date", DateTime),
        Column::new("title", Text),
        Column::new("body", Text),
    ],
};

pub static QUESTION_SNAPSHOT_TAG: Table = Table {
    name: "questionsnapshottag",
    columns: &[
        Column::new("question_snapshot_id", Integer).index(),
        Column::new("tag_id", Integer).index(),
    ],
};

// Stack Overflow data dump. Ids match the dump, cross-references are plain
// integers without foreign keys.

pub static POST: Table = Table {
    name: "post",
    columns: &[
        Column::new("post_type_id", Integer),
        Column::new("accepted_answer_id", Integer).null(),
        Column::new("parent_id", Integer).null(),
        Column::new("creation_date", DateTime),
        Column::new("deletion_date", DateTime).null(),
        Column::new("score", Integer),
        Column::new("view_count", Integer).null(),
        Column::new("body", Text),
        Column::new("owner_user_id", Integer).null(),
        Column::new("owner_display_name", Char(80)).null(),
        Column::new("last_editor_user_id", Integer).null(),
        Column::new("last_editor_display_name", Char(80)).null(),
        Column::new("last_edit_date", DateTime).null(),
        Column::new("last_activity_date", DateTime),
        Column::new("title", Text).null(),
        Column::new("tags", Text).null(),
        Column::new("answer_count", Integer).null(),
        Column::new("comment_count", Integer),
        Column::new("favorite_count", Integer).null(),
        Column::new("closed_date", DateTime).null(),
        Column::new("community_owned_date", DateTime).null(),
    ],
};

pub static TAG: Table = Table {
    name: "tag",
    columns: &[
        Column::new("tag_name", Char(70)).index(),
        Column::new("count", Integer),
        Column::new("excerpt_post_id", Integer).index().null(),
        Column::new("wiki_post_id", Integer).null(),
    ],
};

pub static POST_HISTORY: Table = Table {
    name: "posthistory",
    columns: &[
        Column::new("post_history_type_id", Integer),
        Column::new("post_id", Integer),
        Column::new("revision_guid", Char(16)),
        Column::new("creation_date", DateTime),
        Column::new("user_id", Integer).null(),
        Column::new("user_display_name", Char(80)).null(),
        Column::new("comment", Text).null(),
        Column::new("text", Text),
    ],
};

pub static POST_LINK: Table = Table {
    name: "postlink",
    columns: &[
        Column::new("creation_date", DateTime),
        Column::new("post_id", Integer),
        Column::new("related_post_id", Integer),
        Column::new("link_type_id", Integer),
    ],
};

pub static VOTE: Table = Table {
    name: "vote",
    columns: &[
        Column::new("post_id", Integer),
        Column::new("vote_type_id", Integer),
        Column::new("user_id", Integer).null(),
        Column::new("creation_date", DateTime),
        Column::new("bounty_amount", Integer).null(),
    ],
};

pub static COMMENT: Table = Table {
    name: "comment",
    columns: &[
        Column::new("post_id", Integer),
        Column::new("score", Integer),
        Column::new("text", Text),
        Column::new("creation_date", DateTime),
        Column::new("user_display_name", Char(60)).null(),
        Column::new("user_id", Integer).null(),
    ],
};

pub static BADGE: Table = Table {
    name: "badge",
    columns: &[
        Column::new("user_id", Integer),
        Column::new("name", Char(100)),
        Column::new("date", DateTime),
        Column::new("class_", Integer),
        Column::new("tag_based", Boolean),
    ],
};

pub static USER: Table = Table {
    name: "user",
    columns: &[
        Column::new("reputation", Integer),
        Column::new("creation_date", DateTime),
        Column::new("display_name", Char(80)),
        Column::new("last_access_date", DateTime),
        Column::new("website_url", Text).null(),
        Column::new("location", Char(200)).null(),
        Column::new("about_me", Text).null(),
        Column::new("views", Integer),
        Column::new("up_votes", Integer),
        Column::new("down_votes", Integer),
        Column::new("profile_image_url", Text).null(),
        Column::new("email_hash", Char(32)).null(),
        Column::new("age", Integer).null(),
        Column::new("account_id", Integer),
    ],
};

pub static POST_TAG: Table = Table {
    name: "posttag",
    columns: &[
        Column::new("post_id", Integer).index(),
        Column::new("tag_id", Integer).index(),
    ],
};

// Derived from posts and documentation

pub static SNIPPET_PATTERN: Table = Table {
    name: "snippetpattern",
    columns: &[Column::new("pattern", Text).index()],
};

pub static POST_SNIPPET: Table = Table {
    name: "postsnippet",
    columns: &[
        compute_index(),
        date(),
        Column::foreign_key("post_id", "post"),
        Column::foreign_key("pattern_id", "snippetpattern"),
        Column::new("snippet", Text),
    ],
};

pub static POST_NPM_INSTALL_PACKAGE: Table = Table {
    name: "postnpminstallpackage",
    columns: &[
        compute_index(),
        date(),
        Column::foreign_key("post_id", "post"),
        Column::new("package", Text),
    ],
};

pub static TASK: Table = Table {
    name: "task",
    columns: &[
        compute_index(),
        date(),
        Column::new("task", Text).index(),
        Column::new("mode", Text).index(),
        Column::foreign_key("search_result_content_id", "searchresultcontent").index(),
    ],
};

pub static VERB: Table = Table {
    name: "verb",
    columns: &[Column::new("verb", Text).index()],
};

pub static NOUN: Table = Table {
    name: "noun",
    columns: &[Column::new("noun", Text).index()],
};

pub static TASK_VERB: Table = Table {
    name: "taskverb",
    columns: &[
        Column::foreign_key("task_id", "task").index(),
        Column::foreign_key("verb_id", "verb").index(),
    ],
};

pub static TASK_NOUN: Table = Table {
    name: "tasknoun",
    columns: &[
        Column::foreign_key("task_id", "task").index(),
        Column::foreign_key("noun_id", "noun").index(),
    ],
};

// GitHub

pub static GITHUB_PROJECT: Table = Table {
    name: "githubproject",
    columns: &[
        fetch_index(),
        date(),
        Column::new("name", Text).index(),
        Column::new("owner", Text),
        Column::new("repo", Text),
    ],
};

pub static ISSUE: Table = Table {
    name: "issue",
    columns: &[
        fetch_index(),
        date(),
        Column::new("github_id", Integer),
        Column::foreign_key("project_id", "githubproject"),
        Column::new("number", Integer),
        Column::new("created_at", DateTime).index(),
        Column::new("updated_at", DateTime).index(),
        Column::new("closed_at", DateTime).index().null(),
        Column::new("state", Text),
        Column::new("body", Text).null(),
        Column::new("comments", Integer),
        Column::new("user_id", Integer).index().null(),
    ],
};

pub static ISSUE_EVENT: Table = Table {
    name: "issueevent",
    columns: &[
        fetch_index(),
        date(),
        Column::new("github_id", Integer),
        Column::foreign_key("issue_id", "issue"),
        Column::new("created_at", DateTime).index(),
        Column::new("event", Text),
    ],
};

pub static ISSUE_COMMENT: Table = Table {
    name: "issuecomment",
    columns: &[
        fetch_index(),
        date(),
        Column::new("github_id", Integer),
        Column::foreign_key("issue_id", "issue"),
        Column::new("created_at", DateTime).index(),
        Column::new("updated_at", DateTime).index(),
        Column::new("body", Text),
        Column::new("user_id", Integer).index().null(),
    ],
};

// Slant

pub static SLANT_TOPIC: Table = Table {
    name: "slanttopic",
    columns: &[
        fetch_index(),
        date(),
        Column::new("topic_id", Integer).index(),
        Column::new("title", Text),
        // path only, the endpoint does not report a host
        Column::new("url_path", Text),
        Column::new("owner_username", Text),
    ],
};

pub static VIEWPOINT: Table = Table {
    name: "viewpoint",
    columns: &[
        fetch_index(),
        date(),
        Column::foreign_key("topic_id", "slanttopic"),
        Column::new("viewpoint_index", Integer),
        Column::new("title", Text),
        Column::new("url_path", Text),
    ],
};

pub static VIEWPOINT_SECTION: Table = Table {
    name: "viewpointsection",
    columns: &[
        fetch_index(),
        date(),
        Column::foreign_key("viewpoint_id", "viewpoint"),
        Column::new("section_index", Integer),
        Column::new("title", Text),
        Column::new("text", Text),
        Column::new("is_con", Boolean),
        Column::new("upvotes", Integer),
        Column::new("downvotes", Integer),
    ],
};

/// All tables, ordered so that referenced tables come first.
pub static TABLES: &[&Table] = &[
    &SEED,
    &QUERY,
    &SEARCH,
    &SEARCH_RESULT,
    &WEB_PAGE_CONTENT,
    &SEARCH_RESULT_CONTENT,
    &CODE,
    &WEB_PAGE_VERSION,
    &QUESTION_SNAPSHOT,
    &QUESTION_SNAPSHOT_TAG,
    &POST,
    &TAG,
    &POST_HISTORY,
    &POST_LINK,
    &VOTE,
    &COMMENT,
    &BADGE,
    &USER,
    &POST_TAG,
    &SNIPPET_PATTERN,
    &POST_SNIPPET,
    &POST_NPM_INSTALL_PACKAGE,
    &TASK,
    &VERB,
    &NOUN,
    &TASK_VERB,
    &TASK_NOUN,
    &GITHUB_PROJECT,
    &ISSUE,
    &ISSUE_EVENT,
    &ISSUE_COMMENT,
    &SLANT_TOPIC,
    &VIEWPOINT,
    &VIEWPOINT_SECTION,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_tables_listed_once() {
        assert_eq!(TABLES.len(), 34);
        let names: HashSet<&str> = TABLES.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TABLES.len());
    }

    #[test]
    fn foreign_keys_point_at_earlier_tables() {
        for (i, table) in TABLES.iter().enumerate() {
            for column in table.columns {
                if let Some(target) = column.references {
                    let pos = TABLES.iter().position(|t| t.name == target);
                    assert!(
                        matches!(pos, Some(p) if p <= i),
                        "{}.{} references {target}",
                        table.name,
                        column.name
                    );
                }
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(table("post"), Some(&POST));
        assert_eq!(table("searchresult").map(|t| t.name), Some("searchresult"));
        assert!(table("posts").is_none());
    }

    #[test]
    fn accepts_primary_key_and_columns() {
        assert!(POST.accepts("id"));
        assert!(POST.accepts("title"));
        assert!(!POST.accepts("headline"));
    }

    #[test]
    fn create_sql_renders_constraints() {
        let sql = ISSUE.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"issue\""));
        assert!(sql.contains("\"project_id\" INTEGER NOT NULL REFERENCES \"githubproject\"(id)"));
        assert!(sql.contains("\"body\" TEXT,"));
        assert!(sql.contains("\"date\" DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert!(sql.contains("CREATE INDEX IF NOT EXISTS \"idx_issue_created_at\""));
    }

    #[test]
    fn char_columns_carry_length() {
        let column = TAG.column("tag_name").unwrap();
        assert_eq!(column.kind, ColumnType::Char(70));
        assert!(column.definition().contains("VARCHAR(70)"));
    }
}
