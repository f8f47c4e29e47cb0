//! Tariff calculator
//!
//! Maps a connection type and a unit count to a bill amount. The rate table is
//! plain data so deployments and tests can substitute their own.

use crate::domain::customer::ConnectionType;
use serde::{Deserialize, Serialize};

/// Per-unit rates by connection type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffTable {
    pub domestic: f64,
    pub workshop: f64,
    pub industrial: f64,
}

impl Default for TariffTable {
    fn default() -> Self {
        Self {
            domestic: 8.0,
            workshop: 11.0,
            industrial: 14.0,
        }
    }
}

impl TariffTable {
    pub fn new(domestic: f64, workshop: f64, industrial: f64) -> Self {
        Self {
            domestic,
            workshop,
            industrial,
        }
    }

    /// Rate for a connection type, `None` when the type is unknown
    pub fn rate_for(&self, connection_type: &ConnectionType) -> Option<f64> {
        match connection_type {
            ConnectionType::Domestic => Some(self.domestic),
            ConnectionType::Workshop => Some(self.workshop),
            ConnectionType::Industrial => Some(self.industrial),
            ConnectionType::Other(_) => None,
        }
    }

    /// Amount owed for `units` on `connection_type`.
    ///
    /// Fractional units truncate toward zero, and an unknown connection type
    /// bills at zero.
    pub fn rate(&self, units: f64, connection_type: &ConnectionType) -> f64 {
        let units = units.trunc().max(0.0);
        match self.rate_for(connection_type) {
            Some(per_unit) => units * per_unit,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let table = TariffTable::default();
        for units in [0u32, 1, 15, 250, 500] {
            let u = f64::from(units);
            assert_eq!(table.rate(u, &ConnectionType::Domestic), u * 8.0);
            assert_eq!(table.rate(u, &ConnectionType::Workshop), u * 11.0);
            assert_eq!(table.rate(u, &ConnectionType::Industrial), u * 14.0);
        }
    }

    #[test]
    fn test_unknown_connection_type_is_free() {
        let table = TariffTable::default();
        let other = ConnectionType::Other("agricultural".to_string());
        assert_eq!(table.rate(120.0, &other), 0.0);
        assert_eq!(table.rate_for(&other), None);
    }

    #[test]
    fn test_fractional_units_truncate() {
        let table = TariffTable::default();
        assert_eq!(table.rate(10.9, &ConnectionType::Domestic), 80.0);
        assert_eq!(table.rate(0.99, &ConnectionType::Industrial), 0.0);
    }

    #[test]
    fn test_substitute_table() {
        let table = TariffTable::new(1.5, 2.0, 3.0);
        assert_eq!(table.rate(10.0, &ConnectionType::Domestic), 15.0);
        assert_eq!(table.rate(10.0, &ConnectionType::Industrial), 30.0);
    }
}
