use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn validate(self) -> Result<Self, AppError> {
        if self.skip < 0 {
            return Err(AppError::validation("skip must be >= 0"));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(self)
    }

    pub fn page(&self) -> i64 {
        self.skip / self.limit + 1
    }
}

/// One window of a listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, p: Pagination) -> Self {
        Self {
            items,
            total,
            page: p.page(),
            size: p.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_number_derives_from_skip() {
        let p = Pagination { skip: 20, limit: 10 }.validate().unwrap();
        assert_eq!(p.page(), 3);
        assert_eq!(Pagination::default().page(), 1);
    }

    #[test]
    fn out_of_range_windows_rejected() {
        assert!(Pagination { skip: -1, limit: 10 }.validate().is_err());
        assert!(Pagination { skip: 0, limit: 0 }.validate().is_err());
        assert!(Pagination { skip: 0, limit: 101 }.validate().is_err());
    }
}
