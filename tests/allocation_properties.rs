//! Property tests for bump layout, reset replay and stats accounting

use gc_arena::allocator::{tagged_size, BLOCK_ALIGN, TAG_SIZE};
use gc_arena::{Config, Runtime};
use proptest::prelude::*;

fn arb_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..512, 1..32)
}

proptest! {
    #[test]
    fn footprint_is_aligned_and_tight(size in 0usize..1 << 20) {
        let footprint = tagged_size(size).unwrap();
        prop_assert_eq!(footprint % BLOCK_ALIGN, 0);
        prop_assert!(footprint >= size + TAG_SIZE);
        prop_assert!(footprint < size + TAG_SIZE + BLOCK_ALIGN);
    }

    #[test]
    fn consecutive_blocks_are_one_footprint_apart(sizes in arb_sizes()) {
        let mut rt = Runtime::new(Config::default());
        let storage: usize = sizes.iter().map(|&s| tagged_size(s).unwrap()).sum();
        let arena = rt.allocate(0, storage).unwrap();

        let blocks = rt
            .eval(arena, |rt| sizes.iter().map(|&s| rt.malloc(s) as usize).collect::<Vec<_>>())
            .unwrap();

        for (pair, &size) in blocks.windows(2).zip(&sizes) {
            prop_assert_eq!(pair[1] - pair[0], tagged_size(size).unwrap());
        }
        prop_assert!(blocks.iter().all(|addr| addr % BLOCK_ALIGN == 0));
        prop_assert_eq!(rt.stats(arena).unwrap().pages, 1);
        prop_assert_eq!(rt.page_available(arena).unwrap(), 0);
    }

    #[test]
    fn reset_replays_identical_addresses(
        sizes in arb_sizes(),
        objects in 0usize..8,
        storage in 0usize..1024,
    ) {
        let mut rt = Runtime::new(Config::default());
        let arena = rt.allocate(objects, storage).unwrap();

        let first = rt
            .eval(arena, |rt| {
                sizes
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| {
                        let ptr = rt.malloc(s);
                        unsafe { ptr.write_bytes(i as u8, s) };
                        ptr as usize
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap();
        rt.reset(arena).unwrap();
        let second = rt
            .eval(arena, |rt| sizes.iter().map(|&s| rt.malloc(s) as usize).collect::<Vec<_>>())
            .unwrap();

        // Pages grown before the reset were freed, so only the initial
        // page is guaranteed to come back at the same addresses, still
        // holding what was written there.
        let initial = rt.arena(arena).unwrap().bump().initial();
        let (start, end) = (initial.start(), initial.end());
        for (i, ((a, b), &size)) in first.iter().zip(&second).zip(&sizes).enumerate() {
            if (start..end).contains(a) {
                prop_assert_eq!(a, b);
                let bytes = unsafe { std::slice::from_raw_parts(*b as *const u8, size) };
                prop_assert!(bytes.iter().all(|&byte| byte == i as u8));
            }
        }
    }

    #[test]
    fn storage_accounting_balances(sizes in arb_sizes(), storage in 0usize..2048) {
        let mut rt = Runtime::new(Config::default());
        let arena = rt.allocate(0, storage).unwrap();
        rt.eval(arena, |rt| {
            for &size in &sizes {
                rt.malloc(size);
            }
        })
        .unwrap();

        let stats = rt.stats(arena).unwrap();
        prop_assert_eq!(stats.used_storage + stats.free_storage, stats.total_storage);
        let requested: usize = sizes.iter().map(|&s| tagged_size(s).unwrap()).sum();
        prop_assert_eq!(stats.used_storage, requested);
    }

    #[test]
    fn trailing_block_resizes_in_place_within_page(
        initial in 0usize..64,
        resized in 0usize..64,
    ) {
        let mut rt = Runtime::new(Config::default());
        let arena = rt.allocate(0, 128).unwrap();

        let (before, after) = rt
            .eval(arena, |rt| {
                let ptr = rt.malloc(initial);
                (ptr, unsafe { rt.realloc(ptr, resized) })
            })
            .unwrap();

        prop_assert_eq!(before, after);
        prop_assert_eq!(rt.page_available(arena).unwrap(), 128 - tagged_size(resized).unwrap());
    }
}
