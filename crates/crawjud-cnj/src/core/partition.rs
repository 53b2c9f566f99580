use std::collections::{BTreeMap, HashMap};

use crate::core::normalize;
use crate::data::{CaseRecord, RegionBatch, RegionCode};

/// Records of one batch grouped by owning region.
#[derive(Debug, Default)]
pub struct Partition {
    /// One batch per distinct region, ordered by region code.
    pub regions: BTreeMap<RegionCode, RegionBatch>,
    /// Canonical case number → position among accepted records.
    pub position_index: HashMap<String, usize>,
    /// Records dropped for an unparsable or duplicated case number.
    pub rejected: usize,
}

impl Partition {
    /// Number of records that made it into a region.
    pub fn accepted(&self) -> usize {
        self.position_index.len()
    }

    pub fn position(&self, case_number: &str) -> Option<usize> {
        self.position_index.get(case_number).copied()
    }
}

/// Group `records` by region, keeping submission order inside each region.
///
/// Records whose number does not normalize are dropped silently; they only
/// show up as the gap between `rejected` and the submitted count. A number
/// seen twice keeps its first position and the repeat is dropped.
pub fn partition(records: impl IntoIterator<Item = CaseRecord>) -> Partition {
    let mut out = Partition::default();

    for mut record in records {
        let Some((region, number)) = normalize(&record.case_number) else {
            out.rejected += 1;
            continue;
        };

        let number = number.into_string();
        if out.position_index.contains_key(&number) {
            tracing::debug!(case = %number, "duplicate case number dropped");
            out.rejected += 1;
            continue;
        }

        let position = out.position_index.len();
        out.position_index.insert(number.clone(), position);

        record.case_number = number;
        record.region_code = Some(region.clone());
        out.regions
            .entry(region.clone())
            .or_insert_with(|| RegionBatch::new(region))
            .records
            .push(record);
    }

    tracing::debug!(
        regions = out.regions.len(),
        accepted = out.accepted(),
        rejected = out.rejected,
        "batch partitioned"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(numbers: &[&str]) -> Vec<CaseRecord> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| CaseRecord::new(i, *n))
            .collect()
    }

    #[test]
    fn groups_by_region_in_submission_order() {
        let batch = records(&[
            "0000001-11.2024.5.02.0001",
            "0000002-11.2024.5.01.0001",
            "0000003-11.2024.5.02.0001",
        ]);
        let p = partition(batch);

        assert_eq!(p.regions.len(), 2);
        let two = &p.regions[&RegionCode::from("2")];
        let numbers: Vec<&str> = two.records.iter().map(|r| r.case_number.as_str()).collect();
        assert_eq!(numbers, ["0000001-11.2024.5.02.0001", "0000003-11.2024.5.02.0001"]);
        assert!(two.records.iter().all(|r| r.region_code == Some(RegionCode::from("2"))));
    }

    #[test]
    fn positions_count_only_accepted_records() {
        let batch = records(&["garbage", "00000011120245020001", "0000002-11.2024.5.01.0001"]);
        let p = partition(batch);

        assert_eq!(p.rejected, 1);
        assert_eq!(p.position("0000001-11.2024.5.02.0001"), Some(0));
        assert_eq!(p.position("0000002-11.2024.5.01.0001"), Some(1));
        assert_eq!(p.position("garbage"), None);
    }

    #[test]
    fn original_index_survives() {
        let batch = records(&["garbage", "0000002-11.2024.5.01.0001"]);
        let p = partition(batch);
        let one = &p.regions[&RegionCode::from("1")];
        assert_eq!(one.records[0].original_index, 1);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let batch = records(&[
            "0000001-11.2024.5.02.0001",
            "00000011120245020001",
        ]);
        let p = partition(batch);
        assert_eq!(p.accepted(), 1);
        assert_eq!(p.rejected, 1);
        assert_eq!(p.regions[&RegionCode::from("2")].len(), 1);
    }

    #[test]
    fn empty_batch() {
        let p = partition(Vec::new());
        assert!(p.regions.is_empty());
        assert_eq!(p.accepted(), 0);
    }
}
