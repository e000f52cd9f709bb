pub mod attendance;
pub mod employee;
pub mod nfc_tag;
pub mod payroll;
pub mod role;
pub mod scan_event;

/// One page of a filtered listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Shared paging parameters, clamped the same way on every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub per_page: u32,
}

impl Paging {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::Paging;

    #[test]
    fn paging_is_clamped() {
        let p = Paging::new(Some(0), Some(1000));
        assert_eq!(p, Paging { page: 1, per_page: 100 });
        assert_eq!(p.offset(), 0);

        let p = Paging::new(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
    }
}
