//! Write paths that keep the FTS5 source tables in sync.
//!
//! Every tag, object label, person name, and caption reaches search only
//! through these methods, so the relational tables and their full-text
//! mirrors cannot drift apart.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::detect::DetectionBox;
use crate::identity::PersonKey;

/// A manual keyword tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A resolved person as stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub face_count: i64,
}

impl Database {
    // ========================================================================
    // Keyword tags
    // ========================================================================

    /// Find a tag by name (case-insensitive) or create it.
    pub fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE name = ? COLLATE NOCASE",
                [name],
                |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if let Some(tag) = existing {
            return Ok(tag);
        }

        self.conn
            .execute("INSERT INTO tags (name) VALUES (?)", [name])?;
        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Attach a keyword tag to a photo and index it for search.
    pub fn add_keyword_tag(&self, photo_id: i64, name: &str) -> Result<i64> {
        let tag = self.get_or_create_tag(name)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO photo_tags (photo_id, tag_id) VALUES (?, ?)",
            params![photo_id, tag.id],
        )?;
        if inserted > 0 {
            self.conn.execute(
                "INSERT INTO keyword_fts (term, photo_id) VALUES (?, ?)",
                params![tag.name, photo_id],
            )?;
        }
        Ok(tag.id)
    }

    pub fn photo_keywords(&self, photo_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.name
            FROM tags t
            JOIN photo_tags pt ON pt.tag_id = t.id
            WHERE pt.photo_id = ?
            ORDER BY t.name
            "#,
        )?;
        let names = stmt
            .query_map([photo_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // ========================================================================
    // AI object tags
    // ========================================================================

    /// Store a surviving detection as an AI object tag and index its label.
    pub fn add_object_tag(&self, photo_id: i64, detection: &DetectionBox) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO object_tags (photo_id, label, confidence, source, bbox_x, bbox_y, bbox_w, bbox_h)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                photo_id,
                detection.label,
                detection.confidence,
                detection.source,
                detection.x,
                detection.y,
                detection.width,
                detection.height,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn.execute(
            "INSERT INTO object_fts (term, photo_id) VALUES (?, ?)",
            params![detection.label, photo_id],
        )?;
        Ok(id)
    }

    // ========================================================================
    // People and faces
    // ========================================================================

    /// Look up a person row by resolver key, creating it with an
    /// auto-generated name on first sight.
    pub fn find_or_create_person(&self, key: &PersonKey) -> Result<i64> {
        let existing = self
            .conn
            .query_row(
                "SELECT id FROM people WHERE key = ?",
                [key.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
        let auto_name = format!("Person {}", count + 1);
        self.conn.execute(
            "INSERT INTO people (key, name) VALUES (?, ?)",
            params![key.as_str(), auto_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record a resolved face: the box, its person, and the person's name
    /// in the search index.
    pub fn record_face(
        &self,
        photo_id: i64,
        key: &PersonKey,
        detection: &DetectionBox,
    ) -> Result<i64> {
        let person_id = self.find_or_create_person(key)?;
        self.conn.execute(
            r#"
            INSERT INTO faces (photo_id, person_id, bbox_x, bbox_y, bbox_w, bbox_h, confidence)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                photo_id,
                person_id,
                detection.x,
                detection.y,
                detection.width,
                detection.height,
                detection.confidence,
            ],
        )?;
        let face_id = self.conn.last_insert_rowid();

        let name: String = self.conn.query_row(
            "SELECT name FROM people WHERE id = ?",
            [person_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO person_fts (term, photo_id, person_id) VALUES (?, ?, ?)",
            params![name, photo_id, person_id],
        )?;

        Ok(face_id)
    }

    /// Rename a person and rebuild their name index entries.
    pub fn rename_person(&self, person_id: i64, new_name: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE people SET name = ? WHERE id = ?",
            params![new_name, person_id],
        )?;
        self.conn.execute(
            "DELETE FROM person_fts WHERE person_id = ?",
            [person_id],
        )?;
        self.conn.execute(
            r#"
            INSERT INTO person_fts (term, photo_id, person_id)
            SELECT ?1, photo_id, ?2 FROM faces WHERE person_id = ?2 GROUP BY photo_id
            "#,
            params![new_name, person_id],
        )?;
        Ok(())
    }

    pub fn get_person(&self, person_id: i64) -> Result<Option<Person>> {
        let person = self
            .conn
            .query_row(
                r#"
                SELECT p.id, p.key, p.name, COUNT(f.id)
                FROM people p
                LEFT JOIN faces f ON f.person_id = p.id
                WHERE p.id = ?
                GROUP BY p.id
                "#,
                [person_id],
                |row| {
                    Ok(Person {
                        id: row.get(0)?,
                        key: row.get(1)?,
                        name: row.get(2)?,
                        face_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(person)
    }

    pub fn all_people(&self) -> Result<Vec<Person>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.key, p.name, COUNT(f.id)
            FROM people p
            LEFT JOIN faces f ON f.person_id = p.id
            GROUP BY p.id
            ORDER BY p.name
            "#,
        )?;
        let people = stmt
            .query_map([], |row| {
                Ok(Person {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    name: row.get(2)?,
                    face_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewPhoto;
    use crate::search::{self, SearchQuery, SourceSet};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn insert_photo(db: &Database, path: &str) -> i64 {
        db.insert_photo(&NewPhoto {
            path: path.to_string(),
            filename: path.rsplit('/').next().unwrap().to_string(),
            directory: "/p".to_string(),
            size_bytes: 1,
            ..NewPhoto::default()
        })
        .unwrap()
    }

    fn detection(label: &str, confidence: f32) -> DetectionBox {
        DetectionBox {
            x: 10,
            y: 10,
            width: 40,
            height: 40,
            label: label.to_string(),
            confidence,
            source: "stub".to_string(),
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
    fn tags_dedupe_case_insensitively() {
        let db = test_db();
        let a = db.get_or_create_tag("Sunset").unwrap();
        let b = db.get_or_create_tag("sunset").unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn repeated_tagging_does_not_duplicate_index_rows() {
        let db = test_db();
        let photo_id = insert_photo(&db, "/p/a.jpg");
        db.add_keyword_tag(photo_id, "sunset").unwrap();
        db.add_keyword_tag(photo_id, "sunset").unwrap();

        let rows: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM keyword_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(db.photo_keywords(photo_id).unwrap(), vec!["sunset"]);
    }

    #[test]
    fn ai_object_tags_match_only_when_enabled() {
        let db = test_db();
        let photo_id = insert_photo(&db, "/p/dog.jpg");
        db.add_object_tag(photo_id, &detection("dog", 0.92)).unwrap();

        // Not reachable through a plain keyword search.
        assert!(run(&db, &SearchQuery::text("dog")).is_empty());

        // Reachable once AI sources participate.
        let query = SearchQuery {
            include_ai_tags: true,
            ..SearchQuery::text("dog")
        };
        assert_eq!(run(&db, &query), vec!["/p/dog.jpg"]);
    }

    #[test]
    fn person_names_are_searchable_after_rename() {
        let db = test_db();
        let photo_id = insert_photo(&db, "/p/face.jpg");
        let key = PersonKey::mint();
        db.record_face(photo_id, &key, &detection("face", 0.88)).unwrap();

        let person_id = db.find_or_create_person(&key).unwrap();
        let person = db.get_person(person_id).unwrap().unwrap();
        assert_eq!(person.name, "Person 1");
        assert_eq!(person.face_count, 1);

        db.rename_person(person_id, "Alice").unwrap();

        let query = SearchQuery {
            include_ai_tags: true,
            ..SearchQuery::text("ali")
        };
        assert_eq!(run(&db, &query), vec!["/p/face.jpg"]);

        // The auto-generated name no longer matches anything.
        let stale = SearchQuery {
            include_ai_tags: true,
            ..SearchQuery::text("person")
        };
        assert!(run(&db, &stale).is_empty());
    }

    #[test]
    fn person_rows_are_reused_by_key() {
        let db = test_db();
        let photo_a = insert_photo(&db, "/p/a.jpg");
        let photo_b = insert_photo(&db, "/p/b.jpg");
        let key = PersonKey::mint();
        db.record_face(photo_a, &key, &detection("face", 0.9)).unwrap();
        db.record_face(photo_b, &key, &detection("face", 0.8)).unwrap();

        let people = db.all_people().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].face_count, 2);
    }
}
