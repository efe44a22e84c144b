use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl PaginationParams {
    /// Saturates at `i64::MAX`, which simply yields an empty page.
    pub fn offset(&self) -> i64 {
        let offset = (self.page.max(1) - 1).saturating_mul(self.limit() as u64);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    /// Clamped to 1..=100.
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100) as i64
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let per_page = params.limit() as u64;
        Self {
            items,
            total,
            page: params.page.max(1),
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        let params = PaginationParams { page: 3, per_page: 20 };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);

        let zero = PaginationParams { page: 0, per_page: 0 };
        assert_eq!(zero.offset(), 0);
        assert_eq!(zero.limit(), 1);
    }

    #[test]
    fn per_page_is_capped() {
        let params = PaginationParams { page: 2, per_page: 500 };
        assert_eq!(params.limit(), 100);
        assert_eq!(params.offset(), 100);
    }

    #[test]
    fn huge_pages_never_go_negative() {
        let params = PaginationParams { page: u64::MAX / 50, per_page: 100 };
        assert_eq!(params.offset(), i64::MAX);

        let last = PaginationParams { page: u64::MAX, per_page: 1 };
        assert_eq!(last.offset(), i64::MAX);
    }

    #[test]
    fn total_pages_round_up() {
        let params = PaginationParams { page: 1, per_page: 20 };
        let page = Paginated::new(vec![1, 2, 3], 41, &params);
        assert_eq!(page.total_pages, 3);

        let empty: Paginated<u8> = Paginated::new(vec![], 0, &params);
        assert_eq!(empty.total_pages, 0);
    }
}
