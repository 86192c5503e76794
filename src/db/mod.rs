//! SQLite-backed photo index.
//!
//! Owns the schema, the write paths that keep the FTS5 source tables in
//! sync with the relational ones, and the execution of compiled search
//! queries. The storage engine itself is plain SQLite; nothing here is
//! async and a connection is not shared across threads.

mod schema;

pub mod index;
pub mod similarity;

pub use index::{Person, Tag};
pub use similarity::SimilarPhoto;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::hash::PerceptualHash;
use crate::search::CompiledQuery;
use schema::SCHEMA;

/// A photo row as handed to the index by the ingest pipeline.
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub path: String,
    pub filename: String,
    pub directory: String,
    pub size_bytes: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    /// ISO-8601 capture timestamp, when EXIF had one.
    pub taken_at: Option<String>,
    pub rating: i64,
    pub description: Option<String>,
    pub copyright: Option<String>,
    pub credit: Option<String>,
    pub sha256_hash: Option<String>,
    pub perceptual_hash: Option<PerceptualHash>,
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoHit {
    pub id: i64,
    pub path: String,
    pub filename: String,
}

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Private in-memory database, used by tests and ephemeral indexing.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a photo row and index its caption text.
    ///
    /// The perceptual hash is stored as its four hex slices so similarity
    /// lookups can pre-filter on slice equality.
    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<i64> {
        let slices = photo.perceptual_hash.map(PerceptualHash::encode);
        let slice = |i: usize| slices.as_ref().map(|s| s[i].as_str());

        self.conn.execute(
            r#"
            INSERT INTO photos (
                path, filename, directory, size_bytes,
                width, height, camera_make, camera_model, lens, taken_at, rating,
                description, copyright, credit,
                sha256_hash, phash_1, phash_2, phash_3, phash_4
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                photo.path,
                photo.filename,
                photo.directory,
                photo.size_bytes,
                photo.width,
                photo.height,
                photo.camera_make,
                photo.camera_model,
                photo.lens,
                photo.taken_at,
                photo.rating,
                photo.description,
                photo.copyright,
                photo.credit,
                photo.sha256_hash,
                slice(0),
                slice(1),
                slice(2),
                slice(3),
            ],
        )?;
        let photo_id = self.conn.last_insert_rowid();

        let caption: Vec<&str> = [&photo.description, &photo.copyright, &photo.credit]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .collect();
        if !caption.is_empty() {
            self.conn.execute(
                "INSERT INTO caption_fts (body, photo_id) VALUES (?, ?)",
                rusqlite::params![caption.join(" "), photo_id],
            )?;
        }

        Ok(photo_id)
    }

    pub fn photo_id_by_path(&self, path: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM photos WHERE path = ?", [path], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Stored content hash for change detection, if any.
    pub fn content_hash(&self, photo_id: i64) -> Result<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT sha256_hash FROM photos WHERE id = ?",
                [photo_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(hash)
    }

    /// Run a compiled search query against the index.
    pub fn execute(&self, query: &CompiledQuery) -> Result<Vec<PhotoHit>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let hits = stmt
            .query_map(rusqlite::params_from_iter(query.params.iter()), |row| {
                Ok(PhotoHit {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    filename: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{self, SearchQuery, SourceSet};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn photo(path: &str, description: Option<&str>) -> NewPhoto {
        NewPhoto {
            path: path.to_string(),
            filename: path.rsplit('/').next().unwrap().to_string(),
            directory: path.rsplit_once('/').map(|(d, _)| d).unwrap_or("").to_string(),
            size_bytes: 1024,
            description: description.map(str::to_string),
            ..NewPhoto::default()
        }
    }

    fn run(db: &Database, query: &SearchQuery) -> Vec<String> {
        let compiled = search::compile(query, &SourceSet::default());
        db.execute(&compiled)
            .unwrap()
            .into_iter()
            .map(|hit| hit.path)
            .collect()
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.db");
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn insert_and_lookup_photo() {
        let db = test_db();
        let id = db.insert_photo(&photo("/p/a.jpg", None)).unwrap();
        assert_eq!(db.photo_id_by_path("/p/a.jpg").unwrap(), Some(id));
        assert_eq!(db.photo_id_by_path("/p/missing.jpg").unwrap(), None);
    }

    #[test]
    fn empty_query_matches_all_photos() {
        let db = test_db();
        db.insert_photo(&photo("/p/a.jpg", None)).unwrap();
        db.insert_photo(&photo("/p/b.jpg", None)).unwrap();
        assert_eq!(run(&db, &SearchQuery::default()).len(), 2);
    }

    #[test]
    fn terms_and_across_sources() {
        let db = test_db();
        let sunset_only = db.insert_photo(&photo("/p/one.jpg", None)).unwrap();
        let both = db.insert_photo(&photo("/p/two.jpg", Some("beach at dusk"))).unwrap();
        db.add_keyword_tag(sunset_only, "sunset").unwrap();
        db.add_keyword_tag(both, "sunset").unwrap();

        // "sunset" alone matches both photos.
        assert_eq!(run(&db, &SearchQuery::text("sunset")).len(), 2);
        // "sunset beach" requires every term; photo one matches only
        // "sunset" (keyword) and is excluded, photo two matches "beach"
        // through its caption.
        assert_eq!(run(&db, &SearchQuery::text("sunset beach")), vec!["/p/two.jpg"]);
    }

    #[test]
    fn caption_fields_are_searchable() {
        let db = test_db();
        let mut p = photo("/p/c.jpg", None);
        p.credit = Some("Ansel Adams".to_string());
        db.insert_photo(&p).unwrap();
        assert_eq!(run(&db, &SearchQuery::text("ansel")), vec!["/p/c.jpg"]);
    }

    #[test]
    fn prefix_matching_on_terms() {
        let db = test_db();
        let id = db.insert_photo(&photo("/p/d.jpg", None)).unwrap();
        db.add_keyword_tag(id, "mountain").unwrap();
        assert_eq!(run(&db, &SearchQuery::text("moun")), vec!["/p/d.jpg"]);
        assert!(run(&db, &SearchQuery::text("ountain")).is_empty());
    }

    #[test]
    fn sanitized_terms_execute_without_error() {
        let db = test_db();
        let id = db.insert_photo(&photo("/p/e.jpg", None)).unwrap();
        db.add_keyword_tag(id, "beach").unwrap();
        // The separator is stripped before matching, never executed.
        assert_eq!(run(&db, &SearchQuery::text("beach;")), vec!["/p/e.jpg"]);
        assert_eq!(run(&db, &SearchQuery::text("bea;ch")), vec!["/p/e.jpg"]);
    }

    #[test]
    fn structured_filters_compose_with_text() {
        let db = test_db();
        let mut low = photo("/photos/2023/a.jpg", Some("lighthouse"));
        low.rating = 1;
        let mut high = photo("/photos/2024/b.jpg", Some("lighthouse"));
        high.rating = 5;
        db.insert_photo(&low).unwrap();
        db.insert_photo(&high).unwrap();

        let query = SearchQuery {
            min_rating: Some(3),
            ..SearchQuery::text("light")
        };
        assert_eq!(run(&db, &query), vec!["/photos/2024/b.jpg"]);

        let query = SearchQuery {
            folder: Some("/photos/2023".to_string()),
            ..SearchQuery::default()
        };
        assert_eq!(run(&db, &query), vec!["/photos/2023/a.jpg"]);
    }
}
