use core::cmp;

/// Prefix sums over row heights.
#[derive(Clone, Debug, Default)]
pub(crate) struct Fenwick {
    tree: Vec<u64>, // 1-indexed
    total: u64,
    max_bit: usize,
}

impl Fenwick {
    pub(crate) fn from_sizes(sizes: &[u32]) -> Self {
        let n = sizes.len();
        let mut tree = vec![0u64; n + 1];
        let mut total = 0u64;
        for i in 1..=n {
            let v = sizes[i - 1] as u64;
            total = total.saturating_add(v);
            tree[i] = tree[i].saturating_add(v);
            let j = i + lsb(i);
            if j <= n {
                tree[j] = tree[j].saturating_add(tree[i]);
            }
        }
        Self {
            tree,
            total,
            max_bit: highest_power_of_two_leq(n),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    pub(crate) fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len() {
            return;
        }
        self.total = self.prefix_sum(new_len);
        self.tree.truncate(new_len + 1);
        self.max_bit = highest_power_of_two_leq(new_len);
    }

    /// Appends one height in `O(log n)`.
    pub(crate) fn push_value(&mut self, value: u64) {
        let new_len = self.len().saturating_add(1);
        if self.tree.is_empty() {
            self.tree.push(0);
        }
        self.tree.push(0);
        self.total = self.total.saturating_add(value);

        // tree[i] holds the sum of the last lsb(i) values ending at i.
        let start_exclusive = new_len - lsb(new_len);
        let before = self
            .prefix_sum(new_len - 1)
            .saturating_sub(self.prefix_sum(start_exclusive));
        self.tree[new_len] = before.saturating_add(value);

        self.max_bit = highest_power_of_two_leq(new_len);
    }

    pub(crate) fn prefix_sum(&self, count: usize) -> u64 {
        let mut i = cmp::min(count, self.len());
        let mut sum = 0u64;
        while i > 0 {
            sum = sum.saturating_add(self.tree[i]);
            i &= i - 1;
        }
        sum
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Returns the number of rows whose prefix sum is <= `target`, i.e. the position of the
    /// row covering offset `target` (clamped to `len`).
    pub(crate) fn lower_bound(&self, mut target: u64) -> usize {
        let n = self.len();
        let mut idx = 0usize;
        let mut bit = self.max_bit;
        while bit != 0 {
            let next = idx + bit;
            if next <= n && self.tree[next] <= target {
                target -= self.tree[next];
                idx = next;
            }
            bit >>= 1;
        }
        idx
    }
}

fn lsb(i: usize) -> usize {
    i & i.wrapping_neg()
}

fn highest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut p = 1usize;
    while p <= n / 2 {
        p <<= 1;
    }
    p
}
