//! NSGA-II building blocks: Pareto dominance, [fast non-dominated sort][1] and
//! crowding distance, plus the selection strategy built on top of them.
//!
//! Fronts always list solution indices in ascending order and the last
//! admitted front is ordered with a stable sort on descending crowding
//! distance, so individuals tied on rank and crowding keep their input order.
//!
//! [1]: https://www.iitk.ac.in/kangal/Deb_NSGA-II.pdf "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"

use std::cmp::Ordering;

use super::individual::Individual;
use super::operators::SelectionStrategy;
use crate::schema::Goal;

/// Returns true when `a` is no worse than `b` in every objective and strictly
/// better in at least one.
pub fn dominates(a: &[f64], b: &[f64], goals: &[Goal]) -> bool {
    let mut strictly_better = false;
    for ((&x, &y), goal) in a.iter().zip(b).zip(goals) {
        let (x, y) = (goal.orient(x), goal.orient(y));
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Lexicographic comparison of oriented fitness vectors, best first.
pub fn lexicographic(a: &[f64], b: &[f64], goals: &[Goal]) -> Ordering {
    a.iter()
        .zip(b)
        .zip(goals)
        .map(|((&x, &y), goal)| goal.orient(x).total_cmp(&goal.orient(y)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Sorts solutions into Pareto fronts. Time complexity is `O(K * N^2)`.
pub fn non_dominated_sort(fitnesses: &[&[f64]], goals: &[Goal]) -> Vec<Vec<usize>> {
    // the indices of the solutions dominated by each solution
    let mut dominated_solutions: Vec<Vec<usize>> = vec![Vec::new(); fitnesses.len()];
    // number of solutions dominating each solution
    let mut domination_count: Vec<usize> = vec![0; fitnesses.len()];

    for p in 0..fitnesses.len() {
        for q in (p + 1)..fitnesses.len() {
            if dominates(fitnesses[p], fitnesses[q], goals) {
                dominated_solutions[p].push(q);
                domination_count[q] += 1;
            } else if dominates(fitnesses[q], fitnesses[p], goals) {
                dominated_solutions[q].push(p);
                domination_count[p] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..fitnesses.len())
        .filter(|&i| domination_count[i] == 0)
        .collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_solutions[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Crowding distance of each member of `front`, in the same order as `front`.
///
/// Extremes of every objective get an infinite distance; objectives whose
/// spread is zero or non-finite contribute nothing to interior members.
pub fn crowding_distance(front: &[usize], fitnesses: &[&[f64]]) -> Vec<f64> {
    let mut distances = vec![0.0; front.len()];
    if front.is_empty() {
        return distances;
    }

    let objective_count = fitnesses[front[0]].len();
    let mut order: Vec<usize> = (0..front.len()).collect();

    for objective in 0..objective_count {
        let value = |slot: usize| fitnesses[front[slot]][objective];
        order.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

        let first = order[0];
        let last = order[order.len() - 1];
        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;

        let spread = value(last) - value(first);
        if !spread.is_finite() || spread <= 0.0 {
            continue;
        }

        let norm = spread * objective_count as f64;
        for window in order.windows(3) {
            let (prev, slot, next) = (window[0], window[1], window[2]);
            distances[slot] += (value(next) - value(prev)) / norm;
        }
    }

    distances
}

/// Select `n` solution indices the way NSGA-II does.
///
/// Complete fronts are admitted in rank order until the next front would
/// overflow `n`; that front is then ordered by descending crowding distance
/// (stable, so ties keep index order) and truncated.
pub fn select_nsga2(fitnesses: &[&[f64]], n: usize, goals: &[Goal]) -> Vec<usize> {
    let n = n.min(fitnesses.len());
    let mut selected = Vec::with_capacity(n);

    for front in non_dominated_sort(fitnesses, goals) {
        let missing = n - selected.len();
        if missing == 0 {
            break;
        }

        if front.len() <= missing {
            selected.extend(front);
            continue;
        }

        let distances = crowding_distance(&front, fitnesses);
        let mut ranked: Vec<(usize, f64)> = front.into_iter().zip(distances).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        selected.extend(ranked.into_iter().take(missing).map(|(index, _)| index));
        break;
    }

    debug_assert_eq!(selected.len(), n);
    selected
}

/// NSGA-II survivor selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nsga2Selection;

impl SelectionStrategy for Nsga2Selection {
    fn select(&self, pool: Vec<Individual>, n: usize, goals: &[Goal]) -> Vec<Individual> {
        // unevaluated individuals only fill what is left after the evaluated ones
        let (evaluated, pending): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(Individual::is_evaluated);

        let indices = {
            let fitnesses: Vec<&[f64]> = evaluated.iter().filter_map(|i| i.fitness()).collect();
            select_nsga2(&fitnesses, n, goals)
        };

        let mut slots: Vec<Option<Individual>> = evaluated.into_iter().map(Some).collect();
        let mut survivors: Vec<Individual> = indices
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();

        let missing = n.saturating_sub(survivors.len());
        survivors.extend(pending.into_iter().take(missing));
        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::genome::Genome;
    use proptest::prelude::*;

    const MIN2: [Goal; 2] = [Goal::Minimize, Goal::Minimize];

    fn as_slices(values: &[Vec<f64>]) -> Vec<&[f64]> {
        values.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn test_dominates() {
        assert!(dominates(&[1.0, 1.0], &[2.0, 1.0], &MIN2));
        assert!(!dominates(&[1.0, 1.0], &[1.0, 1.0], &MIN2));
        assert!(!dominates(&[1.0, 3.0], &[2.0, 1.0], &MIN2));

        let mixed = [Goal::Minimize, Goal::Maximize];
        assert!(dominates(&[1.0, 5.0], &[1.0, 4.0], &mixed));
        assert!(!dominates(&[1.0, 4.0], &[1.0, 5.0], &mixed));
    }

    #[test]
    fn test_non_dominated_sort_fronts() {
        let values = vec![
            vec![1.0, 4.0], // front 0
            vec![2.0, 5.0], // front 1
            vec![4.0, 1.0], // front 0
            vec![3.0, 3.0], // front 0
            vec![5.0, 5.0], // front 2
        ];
        let fronts = non_dominated_sort(&as_slices(&values), &MIN2);
        assert_eq!(fronts, vec![vec![0, 2, 3], vec![1], vec![4]]);
    }

    #[test]
    fn test_crowding_distance_extremes_infinite() {
        let values = vec![vec![1.0, 4.0], vec![2.0, 3.0], vec![3.0, 2.0], vec![4.0, 1.0]];
        let slices = as_slices(&values);
        let distances = crowding_distance(&[0, 1, 2, 3], &slices);

        assert!(distances[0].is_infinite());
        assert!(distances[3].is_infinite());
        // (3 - 1) / (3 * 2) per objective, two objectives
        assert!((distances[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((distances[2] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_crowding_distance_ignores_infinite_spread() {
        let values = vec![vec![1.0], vec![2.0], vec![f64::INFINITY]];
        let distances = crowding_distance(&[0, 1, 2], &as_slices(&values));
        assert_eq!(distances[1], 0.0);
    }

    #[test]
    fn test_select_prefers_less_crowded() {
        let values = vec![
            vec![0.0, 10.0],
            vec![4.9, 5.1],
            vec![5.0, 5.0],
            vec![10.0, 0.0],
            vec![2.0, 8.0],
        ];
        let selected = select_nsga2(&as_slices(&values), 4, &MIN2);
        assert_eq!(selected.len(), 4);
        assert!(selected.contains(&0));
        assert!(selected.contains(&3));
        assert!(selected.contains(&4));
    }

    #[test]
    fn test_select_ties_keep_input_order() {
        let values = vec![vec![1.0, 1.0]; 5];
        let selected = select_nsga2(&as_slices(&values), 3, &MIN2);
        assert_eq!(selected, vec![0, 4, 1]);
    }

    #[test]
    fn test_strategy_returns_exactly_n() {
        let pool: Vec<Individual> = (0..8)
            .map(|i| {
                let mut ind = Individual::new(i, Genome::default(), 0);
                ind.set_fitness(vec![i as f64, (8 - i) as f64]);
                ind
            })
            .collect();

        let survivors = Nsga2Selection.select(pool, 5, &MIN2);
        assert_eq!(survivors.len(), 5);
    }

    proptest! {
        #[test]
        fn first_front_is_mutually_non_dominated(
            values in prop::collection::vec(prop::collection::vec(0.0f64..10.0, 2), 1..40)
        ) {
            let slices = as_slices(&values);
            let fronts = non_dominated_sort(&slices, &MIN2);

            let total: usize = fronts.iter().map(Vec::len).sum();
            prop_assert_eq!(total, values.len());

            for &a in &fronts[0] {
                for &b in &fronts[0] {
                    prop_assert!(!dominates(slices[a], slices[b], &MIN2));
                }
            }
        }

        #[test]
        fn selection_size_is_exact(
            values in prop::collection::vec(prop::collection::vec(0.0f64..10.0, 3), 1..40),
            n in 0usize..50
        ) {
            let slices = as_slices(&values);
            let goals = [Goal::Minimize, Goal::Maximize, Goal::Minimize];
            let selected = select_nsga2(&slices, n, &goals);

            prop_assert_eq!(selected.len(), n.min(values.len()));
            let mut unique = selected.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), selected.len());
        }
    }
}
