use crate::database::schema::NamedTable;
use crate::database::store::{DbError, GeneReadsDb};
use log::{info, warn};
use std::borrow::Cow;
use std::collections::HashMap;

/// `name -> id` cache over one named table, filled lazily.
///
/// A miss falls through to the database, which inserts the name only when
/// no other writer has added it since the cache was loaded.
#[derive(Debug)]
pub struct IdCache {
    table: NamedTable,
    ids: HashMap<String, i64>,
    inserted: usize,
}

impl IdCache {
    /// Loads every existing name of `table`.
    pub fn load(db: &GeneReadsDb, table: NamedTable) -> Result<Self, DbError> {
        let ids = db.named_ids(table)?;
        Ok(IdCache {
            table,
            ids,
            inserted: 0,
        })
    }

    pub fn get_or_insert(&mut self, db: &GeneReadsDb, name: &str) -> Result<i64, DbError> {
        let name = stored_name(self.table, name);
        if let Some(&id) = self.ids.get(name.as_ref()) {
            return Ok(id);
        }
        let (id, inserted) = db.insert_named(self.table, &name)?;
        if inserted {
            info!("Inserted {} into {} (id {})", name, self.table.table_name(), id);
            self.inserted += 1;
        }
        self.ids.insert(name.into_owned(), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Names this cache added to the database.
    pub fn inserted(&self) -> usize {
        self.inserted
    }
}

/// The name as it is stored: truncated to the table's character limit.
pub fn stored_name(table: NamedTable, name: &str) -> Cow<'_, str> {
    let Some(limit) = table.max_name_chars() else {
        return Cow::Borrowed(name);
    };
    match name.char_indices().nth(limit) {
        Some((cut, _)) => {
            let truncated = &name[..cut];
            warn!(
                "{} name exceeds {} characters, truncating {} to {}",
                table.table_name(),
                limit,
                name,
                truncated
            );
            Cow::Borrowed(truncated)
        }
        None => Cow::Borrowed(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_insert_on_miss() {
        let db = GeneReadsDb::open_in_memory().unwrap();
        db.insert_named(NamedTable::Stations, "ST01").unwrap();

        let mut cache = IdCache::load(&db, NamedTable::Stations).unwrap();
        assert_eq!(cache.len(), 1);

        let existing = cache.get_or_insert(&db, "ST01").unwrap();
        let added = cache.get_or_insert(&db, "ST02").unwrap();
        assert_ne!(existing, added);
        assert_eq!(cache.get_or_insert(&db, "ST02").unwrap(), added);
        assert_eq!(cache.inserted(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_miss_picks_up_rows_from_other_writers() {
        let db = GeneReadsDb::open_in_memory().unwrap();
        let mut cache = IdCache::load(&db, NamedTable::Ecotypes).unwrap();
        let (id, _) = db.insert_named(NamedTable::Ecotypes, "HLII").unwrap();
        assert_eq!(cache.get_or_insert(&db, "HLII").unwrap(), id);
        assert_eq!(cache.inserted(), 0);
    }

    #[test]
    fn test_long_contig_names_are_truncated() {
        let long = "é".repeat(200);
        let stored = stored_name(NamedTable::Contigs, &long);
        assert_eq!(stored.chars().count(), 191);

        let db = GeneReadsDb::open_in_memory().unwrap();
        let mut cache = IdCache::load(&db, NamedTable::Contigs).unwrap();
        let id = cache.get_or_insert(&db, &long).unwrap();
        let other = format!("{}xyz", &long);
        assert_eq!(cache.get_or_insert(&db, &other).unwrap(), id);
        assert_eq!(cache.inserted(), 1);
    }

    #[test]
    fn test_station_names_are_not_truncated() {
        let long = "s".repeat(300);
        assert_eq!(stored_name(NamedTable::Stations, &long).len(), 300);
    }
}
