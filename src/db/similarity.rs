//! Near-duplicate lookup over the sliced perceptual-hash columns.

use anyhow::Result;
use std::collections::HashSet;

use super::Database;
use crate::hash::{PerceptualHash, SLICE_COUNT};

/// A photo whose stored hash landed within the requested distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPhoto {
    pub id: i64,
    pub path: String,
    pub hash: PerceptualHash,
    /// Hamming distance to the probe (or to the group representative).
    pub distance: u32,
}

impl Database {
    /// Photos within `max_distance` bits of `hash`, nearest first.
    ///
    /// For distances below the slice count, the pigeonhole principle
    /// guarantees a match shares at least one 16-bit slice verbatim, so
    /// candidates come from the indexed slice columns; larger distances
    /// fall back to scanning every hashed photo. Either way each candidate
    /// is verified with a full Hamming comparison.
    pub fn find_similar(&self, hash: PerceptualHash, max_distance: u32) -> Result<Vec<SimilarPhoto>> {
        let slices = hash.encode();

        let candidates = if max_distance < SLICE_COUNT as u32 {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT id, path, phash_1, phash_2, phash_3, phash_4
                FROM photos
                WHERE phash_1 = ?1 OR phash_2 = ?2 OR phash_3 = ?3 OR phash_4 = ?4
                "#,
            )?;
            collect_hashed(&mut stmt, rusqlite::params![slices[0], slices[1], slices[2], slices[3]])?
        } else {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT id, path, phash_1, phash_2, phash_3, phash_4
                FROM photos
                WHERE phash_1 IS NOT NULL
                "#,
            )?;
            collect_hashed(&mut stmt, rusqlite::params![])?
        };

        let mut similar: Vec<SimilarPhoto> = candidates
            .into_iter()
            .filter_map(|(id, path, stored)| {
                let distance = hash.hamming(stored);
                (distance <= max_distance).then_some(SimilarPhoto {
                    id,
                    path,
                    hash: stored,
                    distance,
                })
            })
            .collect();
        similar.sort_by_key(|p| (p.distance, p.id));
        Ok(similar)
    }

    /// Group all hashed photos into near-duplicate clusters.
    ///
    /// Greedy single pass: the first unprocessed photo becomes a group
    /// representative and pulls in every later photo within the distance.
    /// Only groups with more than one member are returned.
    pub fn find_duplicate_groups(&self, max_distance: u32) -> Result<Vec<Vec<SimilarPhoto>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, path, phash_1, phash_2, phash_3, phash_4
            FROM photos
            WHERE phash_1 IS NOT NULL
            ORDER BY id
            "#,
        )?;
        let photos = collect_hashed(&mut stmt, rusqlite::params![])?;

        let mut groups = Vec::new();
        let mut processed: HashSet<i64> = HashSet::new();

        for (i, (id, path, hash)) in photos.iter().enumerate() {
            if processed.contains(id) {
                continue;
            }
            let mut group = vec![SimilarPhoto {
                id: *id,
                path: path.clone(),
                hash: *hash,
                distance: 0,
            }];
            for (other_id, other_path, other_hash) in photos.iter().skip(i + 1) {
                if processed.contains(other_id) {
                    continue;
                }
                let distance = hash.hamming(*other_hash);
                if distance <= max_distance {
                    group.push(SimilarPhoto {
                        id: *other_id,
                        path: other_path.clone(),
                        hash: *other_hash,
                        distance,
                    });
                    processed.insert(*other_id);
                }
            }
            if group.len() > 1 {
                processed.insert(*id);
                groups.push(group);
            }
        }
        Ok(groups)
    }
}

/// Run a candidate statement and decode stored slices. Rows whose slices no
/// longer decode are logged and skipped; a corrupt hash means "hash
/// unavailable" for that photo, never a failed lookup.
fn collect_hashed<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> Result<Vec<(i64, String, PerceptualHash)>> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            [
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ],
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, path, slices) = row?;
        match PerceptualHash::decode(&slices) {
            Ok(hash) => out.push((id, path, hash)),
            Err(err) => {
                tracing::warn!(photo_id = id, %err, "skipping photo with undecodable hash");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewPhoto;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn insert_hashed(db: &Database, path: &str, hash: u64) -> i64 {
        db.insert_photo(&NewPhoto {
            path: path.to_string(),
            filename: path.rsplit('/').next().unwrap().to_string(),
            directory: "/p".to_string(),
            size_bytes: 1,
            perceptual_hash: Some(PerceptualHash(hash)),
            ..NewPhoto::default()
        })
        .unwrap()
    }

    #[test]
    fn prefiltered_lookup_finds_near_hashes() {
        let db = test_db();
        insert_hashed(&db, "/p/base.jpg", 0x0000_0000_0000_0000);
        insert_hashed(&db, "/p/near.jpg", 0x0000_0000_0000_0001);
        insert_hashed(&db, "/p/far.jpg", 0xFFFF_FFFF_FFFF_FFFF);

        let similar = db.find_similar(PerceptualHash(0), 2).unwrap();
        let paths: Vec<&str> = similar.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/p/base.jpg", "/p/near.jpg"]);
        assert_eq!(similar[0].distance, 0);
        assert_eq!(similar[1].distance, 1);
    }

    #[test]
    fn wide_threshold_scans_past_the_prefilter() {
        let db = test_db();
        // One bit flipped in each slice: no slice equality with zero, so a
        // prefiltered lookup could never see it.
        insert_hashed(&db, "/p/spread.jpg", 0x0001_0001_0001_0001);

        assert!(db.find_similar(PerceptualHash(0), 3).unwrap().is_empty());
        let similar = db.find_similar(PerceptualHash(0), 4).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].distance, 4);
    }

    #[test]
    fn photos_without_hash_are_invisible() {
        let db = test_db();
        db.insert_photo(&NewPhoto {
            path: "/p/unhashed.jpg".to_string(),
            filename: "unhashed.jpg".to_string(),
            directory: "/p".to_string(),
            size_bytes: 1,
            ..NewPhoto::default()
        })
        .unwrap();
        assert!(db.find_similar(PerceptualHash(0), 64).unwrap().is_empty());
    }

    #[test]
    fn corrupt_stored_hash_is_skipped_not_fatal() {
        let db = test_db();
        let id = insert_hashed(&db, "/p/bad.jpg", 0);
        db.conn
            .execute("UPDATE photos SET phash_2 = 'zzzz' WHERE id = ?", [id])
            .unwrap();
        insert_hashed(&db, "/p/good.jpg", 0);

        let similar = db.find_similar(PerceptualHash(0), 0).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].path, "/p/good.jpg");
    }

    #[test]
    fn duplicate_groups_cluster_near_hashes() {
        let db = test_db();
        insert_hashed(&db, "/p/a.jpg", 0x00);
        insert_hashed(&db, "/p/b.jpg", 0x01);
        insert_hashed(&db, "/p/c.jpg", 0x03);
        insert_hashed(&db, "/p/lone.jpg", 0xFFFF_0000_FFFF_0000);

        let groups = db.find_duplicate_groups(2).unwrap();
        assert_eq!(groups.len(), 1);
        let paths: Vec<&str> = groups[0].iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/p/a.jpg", "/p/b.jpg", "/p/c.jpg"]);
    }
}
