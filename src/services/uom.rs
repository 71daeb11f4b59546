use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::domain::uom::ConversionGraph;
use crate::entities::{uom_conversion, uom_unit};
use crate::errors::ServiceError;

const DEFAULT_ROUNDING_SCALE: u32 = 6;

/// Loads the unit/conversion catalog into an in-memory graph and exposes `convert`. The graph
/// is small and changes rarely, so it is reloaded per call rather than cached across requests;
/// callers planning many conversions in one operation (MRP, BOM enrichment) should load a
/// `ConversionGraph` once themselves via `load_graph` instead of calling `convert` in a loop.
pub struct UomService {
    db: DatabaseConnection,
    rounding_scale: u32,
}

impl UomService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, rounding_scale: DEFAULT_ROUNDING_SCALE }
    }

    pub fn with_rounding_scale(db: DatabaseConnection, rounding_scale: u32) -> Self {
        Self { db, rounding_scale }
    }

    pub async fn load_graph(&self) -> Result<ConversionGraph, ServiceError> {
        let mut graph = ConversionGraph::new();
        for unit in uom_unit::Entity::find().all(&self.db).await? {
            graph.add_unit(unit.code, unit.dimension);
        }
        for edge in uom_conversion::Entity::find().all(&self.db).await? {
            graph.add_edge(edge.from_unit, edge.to_unit, edge.factor);
        }
        Ok(graph)
    }

    pub async fn convert(&self, qty: Decimal, from_unit: &str, to_unit: &str) -> Result<Decimal, ServiceError> {
        let graph = self.load_graph().await?;
        graph.convert(qty, from_unit, to_unit, self.rounding_scale)
    }

    pub async fn validate_catalog(&self) -> Result<(), ServiceError> {
        let graph = self.load_graph().await?;
        graph.validate_consistency(Decimal::new(1, self.rounding_scale))
    }
}
