// Property tests for script ordering and plan computation

use chrono::Utc;
use proptest::prelude::*;
use strata_core::plan::{validate_scripts, OrderPolicy, Plan};
use strata_core::{LedgerEntry, MigrationScript};

fn scripts_from(prefixes: &[u32]) -> Vec<MigrationScript> {
    prefixes
        .iter()
        .map(|n| {
            MigrationScript::new(
                format!("{:04}_step", n),
                format!("CREATE TABLE step_{} (id INTEGER);", n),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn validated_order_is_ascending_for_any_discovery_order(
        prefixes in proptest::collection::btree_set(0u32..10_000, 1..40)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let sorted = validate_scripts(scripts_from(&prefixes)).unwrap();
        let ids: Vec<&str> = sorted.iter().map(|s| s.id()).collect();
        let mut expected = ids.clone();
        expected.sort();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(sorted.len(), prefixes.len());
    }

    #[test]
    fn applied_prefix_leaves_suffix_pending_in_order(
        count in 1usize..30,
        applied_len in 0usize..30,
    ) {
        let applied_len = applied_len.min(count);
        let prefixes: Vec<u32> = (0..count as u32).collect();
        let scripts = validate_scripts(scripts_from(&prefixes)).unwrap();
        let ledger: Vec<LedgerEntry> = scripts[..applied_len]
            .iter()
            .map(|s| LedgerEntry::new(s.id(), Utc::now(), s.checksum()))
            .collect();

        let plan = Plan::compute(&scripts, &ledger);

        prop_assert_eq!(plan.applied.len(), applied_len);
        prop_assert!(plan.unknown.is_empty());
        prop_assert!(plan.drift().is_empty());
        prop_assert!(plan.check_order(OrderPolicy::Strict).is_ok());
        let pending: Vec<&str> = plan.pending.iter().map(|s| s.id()).collect();
        let expected: Vec<&str> = scripts[applied_len..].iter().map(|s| s.id()).collect();
        prop_assert_eq!(pending, expected);
    }
}
