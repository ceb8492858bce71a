//! Stock records

use crate::Database;
use crate::error::{Result, StoreError};
use crate::rows::StockRow;
use research_core::Stock;

const STOCK_COLUMNS: &str =
    "id, symbol, name, exchange, currency, sector, industry, is_tracked";

impl Database {
    pub async fn find_stock_by_symbol(&self, symbol: &str) -> Result<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = ?"
        ))
        .bind(symbol)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Stock::from))
    }

    pub async fn get_stock(&self, id: i64) -> Result<Stock> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Stock::from)
            .ok_or_else(|| StoreError::not_found("stock", id))
    }

    /// Return the stock for `symbol`, inserting a bare record if none exists.
    ///
    /// `tracked` only applies to a newly created record; an existing stock
    /// keeps its flag. The symbol must already be normalized.
    pub async fn first_or_create_stock(&self, symbol: &str, tracked: bool) -> Result<Stock> {
        sqlx::query(
            "INSERT INTO stocks (symbol, name, is_tracked) VALUES (?, ?, ?) \
             ON CONFLICT (symbol) DO NOTHING",
        )
        .bind(symbol)
        .bind(symbol)
        .bind(tracked)
        .execute(self.pool())
        .await?;

        self.find_stock_by_symbol(symbol)
            .await?
            .ok_or_else(|| StoreError::not_found("stock", symbol))
    }

    /// Tracked stocks ordered by symbol, optionally restricted to a sector
    pub async fn list_stocks(
        &self,
        sector: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Stock>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks \
             WHERE is_tracked = 1 AND (?1 IS NULL OR sector = ?1) \
             ORDER BY symbol LIMIT ?2 OFFSET ?3"
        ))
        .bind(sector)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Stock::from).collect())
    }

    /// Distinct non-empty sectors across all stocks
    pub async fn list_sectors(&self) -> Result<Vec<String>> {
        let sectors = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT sector FROM stocks \
             WHERE sector IS NOT NULL AND sector != '' ORDER BY sector",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(sectors)
    }

    pub async fn set_tracked(&self, stock_id: i64, tracked: bool) -> Result<()> {
        let result = sqlx::query("UPDATE stocks SET is_tracked = ? WHERE id = ?")
            .bind(tracked)
            .bind(stock_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("stock", stock_id));
        }
        Ok(())
    }
}
