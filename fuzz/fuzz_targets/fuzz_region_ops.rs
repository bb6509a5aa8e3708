#![no_main]

use formgrid_model::{CellAddress, CellStatus, Rect, RegionId, RegionIndex};
use libfuzzer_sys::fuzz_target;

const MAX_OPS: usize = 256;

fuzz_target!(|data: &[u8]| {
    let mut index = RegionIndex::new();

    // Each op is 4 bytes: kind, row, col, span.
    for op in data.chunks_exact(4).take(MAX_OPS) {
        let row = u32::from(op[1] % 32) + 1;
        let col = u32::from(op[2] % 16) + 1;
        let rows = u32::from(op[3] & 0x0f) + 1;
        let cols = u32::from(op[3] >> 4) + 1;
        let Ok(origin) = CellAddress::new(row, col) else {
            return;
        };

        match op[0] % 4 {
            0 => {
                if let Some(rect) = Rect::from_span(origin, rows, cols) {
                    let _ = index.add(rect);
                }
            }
            1 => {
                let _ = index.remove(RegionId::new(u32::from(op[1])));
            }
            2 => {
                let _ = index.resize(RegionId::new(u32::from(op[2])), rows, cols);
            }
            _ => {
                if let CellStatus::RegionOrigin(r) | CellStatus::RegionCovered(r) = index.locate(origin) {
                    assert!(r.rect.contains(origin));
                }
            }
        }
    }

    let regions: Vec<_> = index.iter().copied().collect();
    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            assert!(!a.rect.intersects(&b.rect), "{} overlaps {}", a.rect, b.rect);
        }
    }
});
