/// Inline SQL migrations for the job store schema.
///
/// Applied in order; `_migrations` records the highest applied version.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: one row per document
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    document_id    TEXT PRIMARY KEY,
    expected_pages INTEGER NOT NULL CHECK (expected_pages >= 0),
    created_at     INTEGER NOT NULL
);
"#,
    // Migration 2: completed pages, one row per (document, page)
    r#"
CREATE TABLE IF NOT EXISTS job_pages (
    document_id TEXT NOT NULL,
    page        INTEGER NOT NULL CHECK (page >= 1),
    PRIMARY KEY (document_id, page)
) WITHOUT ROWID;
"#,
];
