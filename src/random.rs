use rand::Rng;

/// Source of randomness for shuffling, injectable so tests are deterministic
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. `len` is never zero.
    fn index(&self, len: usize) -> usize;
}

/// Thread-local RNG backed source
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Shuffle by repeatedly drawing a uniformly random remaining element
pub fn shuffle<T>(items: Vec<T>, random: &dyn RandomSource) -> Vec<T> {
    let mut remaining = items;
    let mut shuffled = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let idx = random.index(remaining.len()).min(remaining.len() - 1);
        shuffled.push(remaining.remove(idx));
    }
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always picks the last remaining element
    struct PickLast;

    impl RandomSource for PickLast {
        fn index(&self, len: usize) -> usize {
            len - 1
        }
    }

    #[test]
    fn test_shuffle_uses_source() {
        assert_eq!(shuffle(vec![1, 2, 3, 4], &PickLast), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut shuffled = shuffle((0..50).collect(), &ThreadRandom);
        shuffled.sort();
        assert_eq!(shuffled, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_empty() {
        assert!(shuffle(Vec::<u8>::new(), &ThreadRandom).is_empty());
    }
}
