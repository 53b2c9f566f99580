use std::collections::HashSet;

use crawjud_cnj::{CaseRecord, RegionCode, normalize, partition};

#[test]
fn three_numbers_two_valid() {
    let batch = vec![
        CaseRecord::new(0, "0000100-20.2024.5.01.0011"),
        CaseRecord::new(1, "0000200-20.2024.5.02.0022"),
        CaseRecord::new(2, "12-ABC"),
    ];

    let p = partition(batch);

    assert_eq!(p.regions.len(), 2);
    assert_eq!(p.regions[&RegionCode::from("1")].len(), 1);
    assert_eq!(p.regions[&RegionCode::from("2")].len(), 1);
    assert_eq!(p.position_index.len(), 2);
    assert!(!p.position_index.contains_key("12-ABC"));
    for batch in p.regions.values() {
        assert!(batch.records.iter().all(|r| r.original_index != 2));
    }
}

#[test]
fn partition_is_a_bijection_over_valid_records() {
    let raw = [
        "0000001-11.2024.5.01.0001",
        "bad",
        "00000021120245040001",
        "0000003-11.2024.5.04.0001",
        "0000004-11.2024.5.24.0001",
        "0000005-11.2024.8.26.0001",
        "0000006-11.2024.5.10.0001",
    ];
    let batch: Vec<CaseRecord> = raw.iter().enumerate().map(|(i, n)| CaseRecord::new(i, *n)).collect();

    let expected: HashSet<String> = raw
        .iter()
        .filter_map(|n| normalize(n))
        .map(|(_, n)| n.into_string())
        .collect();

    let p = partition(batch);

    let seen: Vec<String> = p
        .regions
        .values()
        .flat_map(|b| b.records.iter().map(|r| r.case_number.clone()))
        .collect();
    let unique: HashSet<String> = seen.iter().cloned().collect();

    assert_eq!(seen.len(), unique.len());
    assert_eq!(unique, expected);

    let positions: HashSet<usize> = p.position_index.values().copied().collect();
    assert_eq!(positions.len(), p.position_index.len());
    assert_eq!(p.rejected, 2);

    let order: Vec<&str> = p.regions.keys().map(RegionCode::as_str).collect();
    assert_eq!(order, ["1", "4", "10", "24"]);
}

#[test]
fn region_is_tribunal_without_leading_zero() {
    for tr in 1..=24u8 {
        let number = format!("0001234-56.2024.5.{tr:02}.0001");
        let (region, canonical) = normalize(&number).unwrap();
        assert_eq!(region.as_str(), tr.to_string());
        assert_eq!(canonical.as_str(), number);
    }
}
