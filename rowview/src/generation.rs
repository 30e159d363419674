/// A generation tag captured by every outstanding request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generation(pub u64);

/// How a response's generation relates to the viewer's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Superseded by a newer request generation: discard.
    Stale,
    /// Same generation as what is on screen: merge.
    Current,
    /// First response of a newer generation: wipe the rendered window, then merge.
    Newer,
}

/// Response-side cancellation.
///
/// `issued` moves forward on every reset (order change, seek, source swap); `applied` trails it
/// and catches up when the first response of the new generation lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationGuard {
    issued: Generation,
    applied: Generation,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generation new requests are tagged with.
    pub fn current(&self) -> Generation {
        self.issued
    }

    pub fn applied(&self) -> Generation {
        self.applied
    }

    /// Starts a new generation; everything issued before it becomes stale.
    pub fn bump(&mut self) -> Generation {
        self.issued = Generation(self.issued.0 + 1);
        self.issued
    }

    /// Classifies a response without changing state.
    pub fn classify(&self, g: Generation) -> Freshness {
        if g < self.issued || g < self.applied {
            Freshness::Stale
        } else if g > self.applied {
            Freshness::Newer
        } else {
            Freshness::Current
        }
    }

    /// Records that a response of generation `g` is being applied.
    pub fn mark_applied(&mut self, g: Generation) {
        debug_assert!(g >= self.applied, "generation applied out of order");
        self.applied = self.applied.max(g);
    }

    /// Adopts whatever is on screen as belonging to the current generation, without a wipe.
    pub fn adopt_current(&mut self) {
        self.applied = self.issued;
    }

    /// True while a reset has been issued but nothing of it has been applied yet.
    pub fn awaiting_reset(&self) -> bool {
        self.issued > self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_generations_are_stale_after_bump() {
        let mut g = GenerationGuard::new();
        let old = g.current();
        let new = g.bump();
        assert_eq!(g.classify(old), Freshness::Stale);
        assert_eq!(g.classify(new), Freshness::Newer);
        assert!(g.awaiting_reset());

        g.mark_applied(new);
        assert_eq!(g.classify(new), Freshness::Current);
        assert!(!g.awaiting_reset());
    }

    #[test]
    fn intermediate_generation_is_stale_once_superseded() {
        let mut g = GenerationGuard::new();
        let g3 = Generation(3);
        let g4 = Generation(4);
        for _ in 0..4 {
            g.bump();
        }
        assert_eq!(g.current(), g4);
        assert_eq!(g.classify(g3), Freshness::Stale);
        g.mark_applied(g4);
        assert_eq!(g.classify(g3), Freshness::Stale);
    }

    #[test]
    fn adopt_skips_the_wipe() {
        let mut g = GenerationGuard::new();
        let next = g.bump();
        g.adopt_current();
        assert_eq!(g.classify(next), Freshness::Current);
    }
}
