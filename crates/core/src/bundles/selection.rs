use std::collections::HashSet;

use crate::domain::product::ProductId;

use super::types::Bundle;

/// Greedy single pass over best-first pairs: a pair is accepted only when neither
/// add-on was used by an earlier accepted pair. The result is the first feasible
/// sequence under the given order, not a search for the best-scoring disjoint set.
pub fn select_diverse(pairs: &[Bundle], max_bundles: usize) -> Vec<Bundle> {
    let mut selected: Vec<Bundle> = Vec::new();
    let mut used: HashSet<ProductId> = HashSet::new();

    for pair in pairs {
        if selected.len() >= max_bundles {
            break;
        }

        let [first, second] = pair.add_on_ids();
        if used.contains(&first) || used.contains(&second) {
            continue;
        }

        used.insert(first);
        used.insert(second);
        selected.push(pair.clone());
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::select_diverse;
    use crate::bundles::types::Bundle;
    use crate::domain::product::{ProductCandidate, ProductId};

    fn add_on(id: i64) -> ProductCandidate {
        ProductCandidate {
            product_id: ProductId(id),
            product_name: format!("Item {id}"),
            department_id: 1,
            co_purchase_count: 10,
            reorder_rate: 0.5,
            total_units: 10,
        }
    }

    fn pair(first: i64, second: i64, pair_score: f64) -> Bundle {
        Bundle { anchor_id: ProductId(0), add_ons: [add_on(first), add_on(second)], pair_score }
    }

    #[test]
    fn rejects_pairs_reusing_an_add_on() {
        let pairs = vec![pair(1, 2, 90.0), pair(1, 3, 80.0), pair(3, 4, 70.0), pair(2, 5, 60.0)];
        let selected = select_diverse(&pairs, 3);

        let ids: Vec<_> = selected.iter().map(Bundle::add_on_ids).collect();
        assert_eq!(ids, vec![[ProductId(1), ProductId(2)], [ProductId(3), ProductId(4)]]);
    }

    #[test]
    fn stops_at_max_bundles() {
        let pairs = vec![pair(1, 2, 9.0), pair(3, 4, 8.0), pair(5, 6, 7.0), pair(7, 8, 6.0)];
        assert_eq!(select_diverse(&pairs, 3).len(), 3);
        assert_eq!(select_diverse(&pairs, 1).len(), 1);
        assert!(select_diverse(&[], 3).is_empty());
    }

    #[test]
    fn greedy_choice_is_kept_even_when_a_better_disjoint_set_exists() {
        // Greedy takes (1,2)=100 and then nothing else fits; (1,3)+(2,4)=180 is never searched.
        let pairs = vec![pair(1, 2, 100.0), pair(1, 3, 95.0), pair(2, 4, 85.0)];
        let selected = select_diverse(&pairs, 3);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].add_on_ids(), [ProductId(1), ProductId(2)]);
    }
}
