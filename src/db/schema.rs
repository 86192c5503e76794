pub const SCHEMA: &str = r#"
-- Photos table: core photo metadata plus index keys
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    directory TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    scanned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,

    -- Image metadata
    width INTEGER,
    height INTEGER,
    camera_make TEXT,
    camera_model TEXT,
    lens TEXT,
    taken_at TEXT,
    rating INTEGER NOT NULL DEFAULT 0,

    -- Caption text
    description TEXT,
    copyright TEXT,
    credit TEXT,

    -- Content hash for change detection
    sha256_hash TEXT,

    -- Perceptual hash stored as four 16-bit hex slices; slice equality
    -- pre-filters candidates before full Hamming comparison
    phash_1 TEXT,
    phash_2 TEXT,
    phash_3 TEXT,
    phash_4 TEXT
);

CREATE INDEX IF NOT EXISTS idx_photos_directory ON photos(directory);
CREATE INDEX IF NOT EXISTS idx_photos_sha256 ON photos(sha256_hash);
CREATE INDEX IF NOT EXISTS idx_photos_taken_at ON photos(taken_at);
CREATE INDEX IF NOT EXISTS idx_photos_phash_1 ON photos(phash_1);
CREATE INDEX IF NOT EXISTS idx_photos_phash_2 ON photos(phash_2);
CREATE INDEX IF NOT EXISTS idx_photos_phash_3 ON photos(phash_3);
CREATE INDEX IF NOT EXISTS idx_photos_phash_4 ON photos(phash_4);

-- Manual keyword tags
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS photo_tags (
    photo_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (photo_id, tag_id),
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_photo_tags_tag ON photo_tags(tag_id);

-- AI-detected object tags with their surviving bounding boxes
CREATE TABLE IF NOT EXISTS object_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL,
    label TEXT NOT NULL,
    confidence REAL NOT NULL,
    source TEXT NOT NULL,
    bbox_x INTEGER NOT NULL,
    bbox_y INTEGER NOT NULL,
    bbox_w INTEGER NOT NULL,
    bbox_h INTEGER NOT NULL,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_object_tags_photo ON object_tags(photo_id);

-- People: resolved identities with a stable external key
CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Faces: detection boxes resolved to a person
CREATE TABLE IF NOT EXISTS faces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL,
    person_id INTEGER NOT NULL,
    bbox_x INTEGER NOT NULL,
    bbox_y INTEGER NOT NULL,
    bbox_w INTEGER NOT NULL,
    bbox_h INTEGER NOT NULL,
    confidence REAL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE,
    FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_faces_photo ON faces(photo_id);
CREATE INDEX IF NOT EXISTS idx_faces_person ON faces(person_id);

-- Full-text source tables, one per term source. Kept in sync by the write
-- paths in db::index.
CREATE VIRTUAL TABLE IF NOT EXISTS keyword_fts USING fts5(term, photo_id UNINDEXED);
CREATE VIRTUAL TABLE IF NOT EXISTS object_fts USING fts5(term, photo_id UNINDEXED);
CREATE VIRTUAL TABLE IF NOT EXISTS person_fts USING fts5(term, photo_id UNINDEXED, person_id UNINDEXED);
CREATE VIRTUAL TABLE IF NOT EXISTS caption_fts USING fts5(body, photo_id UNINDEXED);
"#;
