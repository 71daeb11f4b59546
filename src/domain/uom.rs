use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::entities::uom_unit::Dimension;
use crate::errors::ServiceError;

/// An in-memory view of the conversion multigraph, loaded once per call from `uom_unit` and
/// `uom_conversion` rows. Edges are directed; `reverse` factors are not assumed, so the catalog
/// must carry both directions for every pair it wants convertible both ways.
#[derive(Debug, Clone, Default)]
pub struct ConversionGraph {
    dimensions: HashMap<String, Dimension>,
    edges: HashMap<String, Vec<(String, Decimal)>>,
}

impl ConversionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, code: impl Into<String>, dimension: Dimension) {
        self.dimensions.insert(code.into(), dimension);
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>, factor: Decimal) {
        let from = from.into();
        self.edges.entry(from).or_default().push((to.into(), factor));
    }

    fn dimension_of(&self, unit: &str) -> Result<Dimension, ServiceError> {
        self.dimensions
            .get(unit)
            .copied()
            .ok_or_else(|| ServiceError::InvalidUnit(unit.to_string()))
    }

    /// Breadth-first search for any path `from -> to`, returning the product of edge factors
    /// along it. The catalog's validation pass (`validate_consistency`) is what guarantees every
    /// path within a dimension yields the same answer, so picking any one path here is sound.
    fn path_factor(&self, from: &str, to: &str) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        let mut visited = HashMap::new();
        visited.insert(from.to_string(), Decimal::ONE);
        let mut queue = VecDeque::new();
        queue.push_back(from.to_string());

        while let Some(node) = queue.pop_front() {
            let acc = *visited.get(&node).unwrap();
            if let Some(neighbors) = self.edges.get(&node) {
                for (next, factor) in neighbors {
                    if visited.contains_key(next) {
                        continue;
                    }
                    let next_acc = acc * factor;
                    if next == to {
                        return Some(next_acc);
                    }
                    visited.insert(next.clone(), next_acc);
                    queue.push_back(next.clone());
                }
            }
        }
        None
    }

    /// Converts `qty` from `from_unit` to `to_unit`, rounding to `scale` with banker's rounding
    /// (round-half-to-even), the default rounding rule `rust_decimal` applies on `round_dp`.
    pub fn convert(&self, qty: Decimal, from_unit: &str, to_unit: &str, scale: u32) -> Result<Decimal, ServiceError> {
        let from_dim = self.dimension_of(from_unit)?;
        let to_dim = self.dimension_of(to_unit)?;
        if from_dim != to_dim {
            return Err(ServiceError::IncommensurableUnits {
                from: from_unit.to_string(),
                to: to_unit.to_string(),
            });
        }
        let factor = self.path_factor(from_unit, to_unit).ok_or_else(|| ServiceError::IncommensurableUnits {
            from: from_unit.to_string(),
            to: to_unit.to_string(),
        })?;
        Ok((qty * factor).round_dp(scale))
    }

    /// Catalog validation: every discoverable path between two units in the same dimension must
    /// agree to within `tolerance`. Returns the offending pair on first disagreement.
    pub fn validate_consistency(&self, tolerance: Decimal) -> Result<(), ServiceError> {
        let units: Vec<&String> = self.dimensions.keys().collect();
        for &a in &units {
            for &b in &units {
                if a == b || self.dimensions[a] != self.dimensions[b] {
                    continue;
                }
                let direct = self.path_factor(a, b);
                let via_all: Vec<Decimal> = self
                    .edges
                    .keys()
                    .filter(|mid| *mid != a && *mid != b)
                    .filter_map(|mid| {
                        let leg1 = self.path_factor(a, mid)?;
                        let leg2 = self.path_factor(mid, b)?;
                        Some(leg1 * leg2)
                    })
                    .collect();
                if let Some(direct) = direct {
                    for candidate in via_all {
                        if (candidate - direct).abs() > tolerance {
                            return Err(ServiceError::CatalogInconsistency(format!(
                                "inconsistent conversion paths between {a} and {b}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;

    #[fixture]
    fn mass_graph() -> ConversionGraph {
        let mut g = ConversionGraph::new();
        g.add_unit("kg", Dimension::Mass);
        g.add_unit("g", Dimension::Mass);
        g.add_unit("each", Dimension::Count);
        g.add_edge("kg", "g", dec!(1000));
        g.add_edge("g", "kg", dec!(0.001));
        g
    }

    #[test_case(dec!(1000), "g", "kg", dec!(1.000000))]
    #[test_case(dec!(5), "kg", "g", dec!(5000.000000))]
    fn converts_within_dimension(qty: Decimal, from: &str, to: &str, expected: Decimal) {
        let g = mass_graph();
        assert_eq!(g.convert(qty, from, to, 6).unwrap(), expected);
    }

    #[rstest]
    fn rejects_cross_dimension(mass_graph: ConversionGraph) {
        assert_matches!(mass_graph.convert(dec!(1), "kg", "each", 6), Err(ServiceError::IncommensurableUnits { .. }));
    }

    #[rstest]
    fn round_trip_is_identity_at_scale(mass_graph: ConversionGraph) {
        let scale = 6;
        let q = dec!(3.5);
        let converted = mass_graph.convert(q, "kg", "g", scale).unwrap();
        let back = mass_graph.convert(converted, "g", "kg", scale).unwrap();
        assert_eq!(back, q.round_dp(scale));
    }
}
