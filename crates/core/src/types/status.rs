//! Order status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Wire and storage names are the Spanish SCREAMING_SNAKE_CASE values used by
/// the front end (`EN_PREPARACION`, `ENVIADO`, `ENTREGADO`, `CANCELADO`).
/// The database stores the same names in a `TEXT` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Being prepared; the initial status of every order.
    #[default]
    EnPreparacion,
    /// Handed to the carrier.
    Enviado,
    /// Delivered to the customer. Terminal.
    Entregado,
    /// Cancelled. Terminal.
    Cancelado,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::EnPreparacion,
        Self::Enviado,
        Self::Entregado,
        Self::Cancelado,
    ];

    /// Returns true if no further transition is permitted from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    /// The wire/storage name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnPreparacion => "EN_PREPARACION",
            Self::Enviado => "ENVIADO",
            Self::Entregado => "ENTREGADO",
            Self::Cancelado => "CANCELADO",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::EnPreparacion.is_terminal());
        assert!(!OrderStatus::Enviado.is_terminal());
        assert!(OrderStatus::Entregado.is_terminal());
        assert!(OrderStatus::Cancelado.is_terminal());
    }

    #[test]
    fn test_display_matches_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("PERDIDO".parse::<OrderStatus>().is_err());
        assert!("enviado".parse::<OrderStatus>().is_err());
    }
}
