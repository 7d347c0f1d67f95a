use stratum_common::Result;

/// The narrow database contract the migration engine depends on.
///
/// Implementations own one connection. Transactions are explicit: the engine
/// calls `begin`, runs statements, then `commit` or `rollback`.
pub trait DatabaseHandle {
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Execute a single statement and return the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<usize>;

    /// Execute a sequence of `;`-separated statements.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// Run a query and return the first column of every row as text.
    /// NULL values are skipped.
    fn query_column(&mut self, sql: &str) -> Result<Vec<String>>;

    /// First value of the first column, if the query returned any row.
    fn query_scalar(&mut self, sql: &str) -> Result<Option<String>> {
        Ok(self.query_column(sql)?.into_iter().next())
    }

    fn table_exists(&mut self, name: &str) -> Result<bool>;
}
