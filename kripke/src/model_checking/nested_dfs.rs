use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::util::traits::AddMany;

use super::buchi::Buchi;

/// A witness split into the part leading to the cycle and the cycle itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lasso {
    pub prefix: Vec<usize>,
    pub cycle: Vec<usize>,
}

impl Lasso {
    /// Split a witness whose last state occurs earlier in it. The cycle
    /// starts at the latest earlier occurrence; the closing duplicate is
    /// dropped.
    pub fn from_witness(mut witness: Vec<usize>) -> Option<Lasso> {
        let last = *witness.last()?;
        let start = witness[..witness.len() - 1].iter().rposition(|s| *s == last)?;
        witness.pop();
        let cycle = witness.split_off(start);
        Some(Lasso { prefix: witness, cycle })
    }
}

impl Buchi {
    /// Nested depth-first search for an accepting lasso.
    ///
    /// Returns the outer search stack followed by the inner path (without
    /// its first state, which is the accepting state ending the outer
    /// stack). The last state of the witness is a state of the outer stack,
    /// which closes the cycle.
    pub fn non_empty(&self) -> Option<Vec<usize>> {
        let mut hashed = BTreeSet::new();
        let mut flagged = BTreeSet::new();

        for s in self.initial_states() {
            if hashed.contains(&s) {
                continue;
            }
            if let Some(witness) = self.outer_search(s, &mut hashed, &mut flagged) {
                debug!(length = witness.len(), "found accepting lasso");
                return Some(witness);
            }
        }
        None
    }

    fn outer_search(&self, s: usize, hashed: &mut BTreeSet<usize>, flagged: &mut BTreeSet<usize>) -> Option<Vec<usize>> {
        // (state, index of the next successor to try)
        let mut stack: VecDeque<(usize, usize)> = VecDeque::new();
        let mut stacked = BTreeSet::new();

        stack.push_front((s, 0));
        stacked.insert(s);
        hashed.insert(s);

        while let Some((state, next)) = stack.front_mut() {
            let state = *state;
            let successors = self.successors(state);
            match successors[*next..].iter().position(|t| !hashed.contains(t)) {
                Some(offset) => {
                    let t = successors[*next + offset];
                    *next += offset + 1;
                    stack.push_front((t, 0));
                    stacked.insert(t);
                    hashed.insert(t);
                }
                None => {
                    if self.accepting(state) {
                        if let Some(path) = self.inner_search(state, &stacked, flagged) {
                            let outer = stack.iter().rev().map(|(s, _)| *s).collect::<Vec<_>>();
                            return Some(outer.add_many(path.into_iter().skip(1)));
                        }
                    }
                    stack.pop_front();
                    stacked.remove(&state);
                }
            }
        }
        None
    }

    /// Search from the accepting state `s` for an edge back onto the outer
    /// stack. `flagged` is shared by every inner search of one emptiness
    /// check.
    fn inner_search(&self, s: usize, stacked: &BTreeSet<usize>, flagged: &mut BTreeSet<usize>) -> Option<Vec<usize>> {
        let mut stack: VecDeque<(usize, usize)> = VecDeque::new();

        stack.push_front((s, 0));
        flagged.insert(s);

        while let Some((state, next)) = stack.front_mut() {
            let successors = self.successors(*state);
            match successors[*next..].iter().position(|t| stacked.contains(t) || !flagged.contains(t)) {
                Some(offset) => {
                    let t = successors[*next + offset];
                    *next += offset + 1;
                    stack.push_front((t, 0));
                    if stacked.contains(&t) {
                        return Some(stack.iter().rev().map(|(s, _)| *s).collect());
                    }
                    flagged.insert(t);
                }
                None => {
                    stack.pop_front();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn automaton(n: usize, initial: &[usize], edges: &[(usize, usize)], accepting: &[usize]) -> Buchi {
        let mut b = Buchi::new();
        for i in 0..n {
            b.add_state(initial.contains(&i));
        }
        for (s, t) in edges {
            b.add_transition(*s, *t);
        }
        b.add_accept_set(accepting.iter().copied().collect());
        b
    }

    fn assert_valid_witness(b: &Buchi, witness: &[usize]) {
        assert!(b.is_initial(witness[0]));
        for pair in witness.windows(2) {
            assert!(b.successors(pair[0]).contains(&pair[1]), "missing edge {} -> {}", pair[0], pair[1]);
        }
        let lasso = Lasso::from_witness(witness.to_vec()).expect("witness must close a cycle");
        assert!(!lasso.cycle.is_empty());
        assert!(lasso.cycle.iter().any(|s| b.accepting(*s)));
        let closing = *witness.last().unwrap();
        assert_eq!(lasso.cycle[0], closing);
    }

    #[test]
    fn lasso_split() {
        let lasso = Lasso::from_witness(vec![0, 1, 2, 3, 2]).unwrap();
        assert_eq!(lasso, Lasso { prefix: vec![0, 1], cycle: vec![2, 3] });
        assert_eq!(Lasso::from_witness(vec![0, 1]), None);
        assert_eq!(Lasso::from_witness(vec![]), None);
    }

    #[test]
    fn self_loop_on_accepting_state() {
        let b = automaton(3, &[0], &[(0, 1), (1, 2), (2, 2)], &[2]);
        let witness = b.non_empty().unwrap();
        assert_eq!(witness, vec![0, 1, 2, 2]);
        assert_valid_witness(&b, &witness);
    }

    #[test]
    fn accepting_state_off_the_cycle_is_empty() {
        let b = automaton(3, &[0], &[(0, 1), (1, 2), (2, 2)], &[1]);
        assert_eq!(b.non_empty(), None);
    }

    #[test]
    fn cycle_through_earlier_state() {
        let b = automaton(4, &[0], &[(0, 1), (1, 2), (2, 3), (3, 1)], &[3]);
        let witness = b.non_empty().unwrap();
        assert_valid_witness(&b, &witness);
        assert_eq!(Lasso::from_witness(witness).unwrap().prefix, vec![0]);
    }

    #[test]
    fn second_initial_state() {
        let b = automaton(3, &[0, 1], &[(0, 0), (1, 2), (2, 1)], &[2]);
        let witness = b.non_empty().unwrap();
        assert_valid_witness(&b, &witness);
        assert_eq!(witness[0], 1);
    }

    #[test]
    fn random_witnesses_are_valid_lassos() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut found = 0;
        for _ in 0..300 {
            let n = rng.gen_range(1..=6);
            let mut b = Buchi::new();
            for i in 0..n {
                b.add_state(i == 0 || rng.gen_bool(0.2));
            }
            for s in 0..n {
                for _ in 0..rng.gen_range(0..=2) {
                    b.add_transition(s, rng.gen_range(0..n));
                }
            }
            b.add_accept_set((0..n).filter(|_| rng.gen_bool(0.3)).collect());

            if let Some(witness) = b.non_empty() {
                assert_valid_witness(&b, &witness);
                found += 1;
            }
        }
        assert!(found > 0);
    }
}
