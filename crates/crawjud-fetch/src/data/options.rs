use serde::{Deserialize, Serialize};

/// Widths of the region and case pools.
///
/// # Examples
///
/// ```
/// use crawjud_fetch::PoolOptions;
///
/// let options = PoolOptions::default().with_regions(2);
/// assert_eq!((options.regions, options.cases_per_region), (2, 4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub regions: usize,
    pub cases_per_region: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            regions: 8,
            cases_per_region: 4,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn with_regions(mut self, regions: usize) -> Self {
        self.regions = regions;
        self
    }

    #[must_use]
    pub fn with_cases_per_region(mut self, cases: usize) -> Self {
        self.cases_per_region = cases;
        self
    }
}
