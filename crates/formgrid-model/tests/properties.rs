use formgrid_model::{decode, encode, CellAddress, Rect, Region, RegionId, RegionIndex};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        // Deterministic so failures reproduce.
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn address_round_trips(row in 1u32..1000, col in 1u32..100) {
        let text = encode(row, col).unwrap();
        prop_assert_eq!(decode(&text).unwrap(), (row, col));
        prop_assert_eq!(encode(row, col).unwrap(), CellAddress::new(row, col).unwrap().to_a1());
    }

    #[test]
    fn decode_never_panics(raw in "\\PC{0,12}") {
        if let Ok((row, col)) = decode(&raw) {
            prop_assert_eq!(encode(row, col).unwrap(), raw);
        }
    }

    #[test]
    fn region_ops_keep_regions_disjoint_and_failures_change_nothing(
        ops in proptest::collection::vec(region_op(), 1..60)
    ) {
        let mut index = RegionIndex::new();
        for op in ops {
            let before: Vec<Region> = index.iter().copied().collect();
            let failed = match op {
                RegionOp::Add { row, col, rows, cols } => {
                    let origin = CellAddress::new(row, col).unwrap();
                    let rect = Rect::from_span(origin, rows, cols).unwrap();
                    match index.add(rect) {
                        Ok(_) => false,
                        Err(err) => {
                            prop_assert!(err.existing.intersects(&rect));
                            true
                        }
                    }
                }
                RegionOp::Resize { pick, rows, cols } => {
                    // Unknown ids and zero spans are valid inputs too.
                    let id = pick_id(&before, pick);
                    index.resize(id, rows, cols).is_err()
                }
                RegionOp::Remove { pick } => {
                    let id = pick_id(&before, pick);
                    index.remove(id).is_none()
                }
            };

            if failed {
                let after: Vec<Region> = index.iter().copied().collect();
                prop_assert_eq!(after, before);
            }

            let regions: Vec<Region> = index.iter().copied().collect();
            for (i, a) in regions.iter().enumerate() {
                for b in &regions[i + 1..] {
                    prop_assert!(!a.rect.intersects(&b.rect), "{} overlaps {}", a.rect, b.rect);
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
enum RegionOp {
    Add { row: u32, col: u32, rows: u32, cols: u32 },
    Resize { pick: usize, rows: u32, cols: u32 },
    Remove { pick: usize },
}

fn region_op() -> impl Strategy<Value = RegionOp> {
    prop_oneof![
        3 => (1u32..12, 1u32..8, 1u32..4, 1u32..4)
            .prop_map(|(row, col, rows, cols)| RegionOp::Add { row, col, rows, cols }),
        2 => (0usize..8, 0u32..5, 0u32..5).prop_map(|(pick, rows, cols)| RegionOp::Resize { pick, rows, cols }),
        1 => (0usize..8).prop_map(|pick| RegionOp::Remove { pick }),
    ]
}

/// An existing region's id when `pick` is in range, otherwise one never handed out.
fn pick_id(regions: &[Region], pick: usize) -> RegionId {
    regions.get(pick).map(|r| r.id).unwrap_or(RegionId::new(u32::MAX))
}
