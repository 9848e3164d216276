//! Codebook delay pattern.
//!
//! MusicGen predicts all codebooks in one decoder step, with codebook `k`
//! lagging `k` steps behind codebook 0. The decoder therefore feeds back a
//! staggered view of its own samples and reads finished frames off the
//! diagonal.

/// Sampled token history for `N` delayed codebooks.
#[derive(Debug, Clone)]
pub struct DelayPattern<const N: usize> {
    codebooks: [Vec<i64>; N],
}

impl<const N: usize> Default for DelayPattern<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DelayPattern<N> {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            codebooks: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Records the tokens sampled for every codebook in one step.
    pub fn push(&mut self, tokens: [i64; N]) {
        for (codebook, token) in self.codebooks.iter_mut().zip(tokens) {
            codebook.push(token);
        }
    }

    /// Next decoder input: the latest token of each codebook, with codebooks
    /// that have not started yet replaced by `pad_token_id`.
    ///
    /// ```text
    ///   0 1 2 3 4 5
    /// 0 x x x x x x
    /// 1 P x x x x x
    /// 2 P P x x x x
    /// 3 P P P x x x
    /// ```
    pub fn next_input(&self, pad_token_id: i64) -> [i64; N] {
        let steps = self.steps();
        std::array::from_fn(|k| {
            if steps > k {
                self.codebooks[k].last().copied().unwrap_or(pad_token_id)
            } else {
                pad_token_id
            }
        })
    }

    /// The most recent complete frame, read along the diagonal.
    ///
    /// None until `N` steps have been recorded.
    pub fn last_frame(&self) -> Option<[i64; N]> {
        let steps = self.steps();
        if steps < N {
            return None;
        }
        Some(std::array::from_fn(|k| self.codebooks[k][steps - N + k]))
    }

    /// Number of decoder steps recorded.
    pub fn steps(&self) -> usize {
        self.codebooks.first().map_or(0, Vec::len)
    }

    /// Returns true if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.steps() == 0
    }

    /// Decoder steps needed to obtain `frames` complete frames.
    pub const fn steps_for(frames: usize) -> usize {
        frames + N - 1
    }
}
