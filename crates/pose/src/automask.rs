//! Automasking factor sources.

/// Per-vertex multiplicative factor in `[0, 1]` applied on top of the mask.
pub trait AutomaskFactors: Sync {
    fn factor(&self, vertex: usize) -> f32;
}

/// Automasking disabled; every vertex gets full strength.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAutomasking;

impl AutomaskFactors for NoAutomasking {
    fn factor(&self, _vertex: usize) -> f32 {
        1.0
    }
}

impl<F> AutomaskFactors for F
where
    F: Fn(usize) -> f32 + Sync,
{
    fn factor(&self, vertex: usize) -> f32 {
        self(vertex)
    }
}

/// Precomputed factors, one per vertex. Vertices past the end get 1.
impl AutomaskFactors for [f32] {
    fn factor(&self, vertex: usize) -> f32 {
        self.get(vertex).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automask_sources() {
        assert_eq!(NoAutomasking.factor(42), 1.0);

        let half = |v: usize| if v % 2 == 0 { 0.5f32 } else { 1.0 };
        assert_eq!(half.factor(2), 0.5);
        assert_eq!(half.factor(3), 1.0);

        let table: &[f32] = &[0.0, 0.25];
        assert_eq!(table.factor(1), 0.25);
        assert_eq!(table.factor(5), 1.0);
    }
}
