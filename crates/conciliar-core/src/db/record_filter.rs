//! Filter builder for unmatched internal record listings
//!
//! Builds the WHERE clause shared by the manual-review listing and the
//! candidate pool used by scoring, so both apply the same direction rule.

use chrono::NaiveDate;

use crate::models::Direction;

/// Builder for constructing internal record query filters
#[derive(Debug, Default, Clone)]
pub struct RecordFilter<'query> {
    pub company_id: Option<i64>,
    /// Only records usable against a bank line of this direction
    pub direction: Option<Direction>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Inclusive bounds on the (non-negative) record amount
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Searches document number, counterparty name and description
    pub search: Option<&'query str>,
    pub limit: Option<i64>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// LIMIT clause (empty if unlimited)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> RecordFilter<'query> {
    /// Create a new filter builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set company (tenant) filter
    pub fn company_id(mut self, id: Option<i64>) -> Self {
        self.company_id = id;
        self
    }

    /// Set bank-line direction; records of the opposite direction are excluded
    pub fn direction(mut self, direction: Option<Direction>) -> Self {
        self.direction = direction;
        self
    }

    /// Set date range filter
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    /// Set amount range filter
    pub fn amount_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// Set text search
    pub fn search(mut self, query: Option<&'query str>) -> Self {
        self.search = query;
        self
    }

    /// Set maximum number of rows
    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    /// Build the filter for unreconciled records of `account_id`
    pub fn build(self, account_id: i64) -> FilterResult {
        let mut conditions = vec!["r.account_id = ?".to_string(), "r.conciliado = 0".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(account_id)];

        if let Some(cid) = self.company_id {
            conditions.push("r.company_id = ?".to_string());
            params.push(Box::new(cid));
        }

        // Direction compatibility: the line's own direction or 'any'
        if let Some(direction) = self.direction {
            conditions.push("r.direction IN (?, 'any')".to_string());
            params.push(Box::new(direction.as_str()));
        }

        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("r.date >= ? AND r.date <= ?".to_string());
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        if let Some(min) = self.min_amount {
            conditions.push("r.amount >= ?".to_string());
            params.push(Box::new(min));
        }

        if let Some(max) = self.max_amount {
            conditions.push("r.amount <= ?".to_string());
            params.push(Box::new(max));
        }

        if let Some(q) = self.search {
            if !q.trim().is_empty() {
                conditions.push(
                    "(r.document_number LIKE ? COLLATE NOCASE OR r.counterparty_name LIKE ? COLLATE NOCASE OR r.description LIKE ? COLLATE NOCASE)"
                        .to_string(),
                );
                let pattern = format!("%{}%", q.trim());
                params.push(Box::new(pattern.clone()));
                params.push(Box::new(pattern.clone()));
                params.push(Box::new(pattern));
            }
        }

        let limit_clause = match self.limit {
            Some(n) if n > 0 => {
                params.push(Box::new(n));
                "LIMIT ?".to_string()
            }
            _ => String::new(),
        };

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            limit_clause,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_filter_scopes_to_unreconciled() {
        let result = RecordFilter::new().build(7);
        assert_eq!(result.where_clause, "WHERE r.account_id = ? AND r.conciliado = 0");
        assert!(result.limit_clause.is_empty());
        assert_eq!(result.params.len(), 1);
    }

    #[test]
    fn test_direction_includes_any() {
        let result = RecordFilter::new().direction(Some(Direction::Inflow)).build(1);
        assert!(result.where_clause.contains("r.direction IN (?, 'any')"));
        assert_eq!(result.params.len(), 2);
    }

    #[test]
    fn test_full_filter_param_count() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let result = RecordFilter::new()
            .company_id(Some(3))
            .direction(Some(Direction::Outflow))
            .date_range(Some((from, to)))
            .amount_range(Some(10.0), Some(500.0))
            .search(Some("acme"))
            .limit(Some(20))
            .build(1);

        // account, company, direction, 2 dates, 2 amounts, 3 search, limit
        assert_eq!(result.params.len(), 11);
        assert_eq!(result.limit_clause, "LIMIT ?");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let result = RecordFilter::new().search(Some("   ")).build(1);
        assert!(!result.where_clause.contains("LIKE"));
    }
}
