//! Candidate schema construction from accumulated field statistics.

use shapesense_core::{FieldSpec, SchemaFields};

use crate::field_stats::FieldStatsMap;

/// Aggregate a sampling pass into a candidate schema.
///
/// A field is optional once it is missing from more than
/// `optional_threshold` of the sampled population:
/// `present_count < (1 - optional_threshold) * total_samples`.
///
/// Type sets come out in canonical sorted order (the accumulator's
/// `BTreeSet` iteration), so two candidates built from the same population
/// compare equal no matter what order types were observed in. That property
/// is what makes the drift comparison against the ledger order-independent.
pub fn build_schema(
    stats: &FieldStatsMap,
    total_samples: u64,
    optional_threshold: f64,
) -> SchemaFields {
    let required_floor = (1.0 - optional_threshold) * total_samples as f64;

    stats
        .iter()
        .map(|(path, stat)| {
            (
                path.clone(),
                FieldSpec {
                    types: stat.types.iter().copied().collect(),
                    present_count: stat.present_count,
                    optional: (stat.present_count as f64) < required_floor,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapesense_core::TypeTag;
    use crate::field_stats::FieldStat;

    fn stats_entry(
        stats: &mut FieldStatsMap,
        path: &str,
        types: &[TypeTag],
        present: u64,
    ) {
        let mut stat = FieldStat::default();
        for t in types {
            stat.types.insert(*t);
        }
        stat.present_count = present;
        stats.insert(path.to_string(), stat);
    }

    #[test]
    fn present_at_threshold_is_required() {
        let mut stats = FieldStatsMap::new();
        stats_entry(&mut stats, "status", &[TypeTag::String], 96);

        let schema = build_schema(&stats, 100, 0.05);
        assert!(!schema["status"].optional, "96 >= 0.95 * 100");
    }

    #[test]
    fn exactly_at_floor_is_required() {
        let mut stats = FieldStatsMap::new();
        stats_entry(&mut stats, "status", &[TypeTag::String], 95);

        let schema = build_schema(&stats, 100, 0.05);
        assert!(!schema["status"].optional, "95 >= 0.95 * 100");
    }

    #[test]
    fn below_floor_is_optional() {
        let mut stats = FieldStatsMap::new();
        stats_entry(&mut stats, "status", &[TypeTag::String], 94);

        let schema = build_schema(&stats, 100, 0.05);
        assert!(schema["status"].optional, "94 < 0.95 * 100");
    }

    #[test]
    fn zero_threshold_requires_full_presence() {
        let mut stats = FieldStatsMap::new();
        stats_entry(&mut stats, "a", &[TypeTag::Integer], 99);
        stats_entry(&mut stats, "b", &[TypeTag::Integer], 100);

        let schema = build_schema(&stats, 100, 0.0);
        assert!(schema["a"].optional);
        assert!(!schema["b"].optional);
    }

    #[test]
    fn type_lists_come_out_sorted() {
        let mut stats = FieldStatsMap::new();
        stats_entry(
            &mut stats,
            "v",
            &[TypeTag::String, TypeTag::Null, TypeTag::Integer],
            10,
        );

        let schema = build_schema(&stats, 10, 0.05);
        assert_eq!(
            schema["v"].types,
            vec![TypeTag::Null, TypeTag::Integer, TypeTag::String]
        );
    }

    #[test]
    fn present_count_is_carried_through() {
        let mut stats = FieldStatsMap::new();
        stats_entry(&mut stats, "x", &[TypeTag::Boolean], 7);

        let schema = build_schema(&stats, 10, 0.05);
        assert_eq!(schema["x"].present_count, 7);
    }
}
