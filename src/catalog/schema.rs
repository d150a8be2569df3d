use rusqlite::Connection;

/// Tables created the first time a catalog file is opened.
///
/// `history` is not read or written yet; it is kept for relevance tuning.
const SCHEMA: &str = "
CREATE TABLE entries (id INTEGER PRIMARY KEY,
                      path VARCHAR NOT NULL UNIQUE,
                      display_name VARCHAR NOT NULL,
                      command_id INTEGER,
                      lastuse TIMESTAMP);
CREATE INDEX lastuse_idx ON entries (lastuse DESC);
CREATE INDEX path_idx ON entries (path);

CREATE TABLE command (id INTEGER PRIMARY KEY,
                      display_name VARCHAR NOT NULL UNIQUE,
                      execute VARCHAR NOT NULL,
                      lastuse TIMESTAMP);
CREATE INDEX command_name_idx ON command (display_name);

CREATE TABLE history (query VARCHAR NOT NULL,
                      entry_id INTEGER NOT NULL,
                      command_id INTEGER NOT NULL,
                      lastuse TIMESTAMP NOT NULL,
                      frequence FLOAT NOT NULL);
";

pub(crate) fn create_tables(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()
}
