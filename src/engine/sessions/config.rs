use rusqlite::params;
use super::SessionStore;
use crate::atoms::error::EngineResult;

impl SessionStore {
    // ── Config storage ─────────────────────────────────────────────────

    pub fn get_config(&self, key: &str) -> EngineResult<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM engine_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_config(&self, key: &str, value: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO engine_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none() {
        let store = SessionStore::open_in_memory().unwrap();
        assert_eq!(store.get_config("nope").unwrap(), None);
    }

    #[test]
    fn set_overwrites() {
        let store = SessionStore::open_in_memory().unwrap();
        store.set_config("classifier.precedence", "rules_first").unwrap();
        store.set_config("classifier.precedence", "model_first").unwrap();
        assert_eq!(
            store.get_config("classifier.precedence").unwrap().as_deref(),
            Some("model_first")
        );
    }
}
