use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reasons a stock quantity can change. The string codes are what lands in
/// the `movement_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    InitialStock,
    StockIn,
    StockOut,
    AdjustmentIn,
    AdjustmentOut,
    OrderReserved,
    OrderCancelledReturn,
    ExcelImport,
    ExcelUpdate,
    StockCount,
}

/// Signed effect a movement type has on the aggregate stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    Increase,
    Decrease,
    /// Never changes the aggregate (informational rows).
    Neutral,
    /// Direction comes from sign(new - previous) at call time
    /// (arbitrary corrections such as EXCEL_UPDATE).
    FollowsDelta,
}

/// Reporting bucket for a movement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementCategory {
    StockIn,
    StockOut,
    Informational,
}

/// The `{effect, category, label}` triple for one movement type.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub effect: StockEffect,
    pub category: MovementCategory,
    pub label: &'static str,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::InitialStock => "INITIAL_STOCK",
            MovementType::StockIn => "STOCK_IN",
            MovementType::StockOut => "STOCK_OUT",
            MovementType::AdjustmentIn => "ADJUSTMENT_IN",
            MovementType::AdjustmentOut => "ADJUSTMENT_OUT",
            MovementType::OrderReserved => "ORDER_RESERVED",
            MovementType::OrderCancelledReturn => "ORDER_CANCELLED_RETURN",
            MovementType::ExcelImport => "EXCEL_IMPORT",
            MovementType::ExcelUpdate => "EXCEL_UPDATE",
            MovementType::StockCount => "STOCK_COUNT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INITIAL_STOCK" => Some(MovementType::InitialStock),
            "STOCK_IN" => Some(MovementType::StockIn),
            "STOCK_OUT" => Some(MovementType::StockOut),
            "ADJUSTMENT_IN" => Some(MovementType::AdjustmentIn),
            "ADJUSTMENT_OUT" => Some(MovementType::AdjustmentOut),
            "ORDER_RESERVED" => Some(MovementType::OrderReserved),
            "ORDER_CANCELLED_RETURN" => Some(MovementType::OrderCancelledReturn),
            "EXCEL_IMPORT" => Some(MovementType::ExcelImport),
            "EXCEL_UPDATE" => Some(MovementType::ExcelUpdate),
            "STOCK_COUNT" => Some(MovementType::StockCount),
            _ => None,
        }
    }

    /// Single source of truth for direction and reporting classification.
    /// Every sign decision in the codebase must go through this table.
    pub fn classification(&self) -> Classification {
        match self {
            MovementType::InitialStock => Classification {
                effect: StockEffect::Increase,
                category: MovementCategory::StockIn,
                label: "Initial stock",
            },
            MovementType::StockIn => Classification {
                effect: StockEffect::Increase,
                category: MovementCategory::StockIn,
                label: "Stock in",
            },
            MovementType::StockOut => Classification {
                effect: StockEffect::Decrease,
                category: MovementCategory::StockOut,
                label: "Stock out",
            },
            MovementType::AdjustmentIn => Classification {
                effect: StockEffect::Increase,
                category: MovementCategory::StockIn,
                label: "Adjustment (in)",
            },
            MovementType::AdjustmentOut => Classification {
                effect: StockEffect::Decrease,
                category: MovementCategory::StockOut,
                label: "Adjustment (out)",
            },
            MovementType::OrderReserved => Classification {
                effect: StockEffect::Decrease,
                category: MovementCategory::StockOut,
                label: "Order reservation",
            },
            MovementType::OrderCancelledReturn => Classification {
                effect: StockEffect::Increase,
                category: MovementCategory::StockIn,
                label: "Order cancellation / return",
            },
            MovementType::ExcelImport => Classification {
                effect: StockEffect::Increase,
                category: MovementCategory::StockIn,
                label: "Bulk import",
            },
            MovementType::ExcelUpdate => Classification {
                effect: StockEffect::FollowsDelta,
                category: MovementCategory::Informational,
                label: "Bulk update",
            },
            MovementType::StockCount => Classification {
                effect: StockEffect::Neutral,
                category: MovementCategory::Informational,
                label: "Stock count",
            },
        }
    }

    /// Whether a previous -> new transition is legal for this type.
    pub fn permits_delta(&self, previous: i32, new: i32) -> bool {
        match self.classification().effect {
            StockEffect::Increase => new > previous,
            StockEffect::Decrease => new < previous,
            StockEffect::Neutral => new == previous,
            StockEffect::FollowsDelta => true,
        }
    }
}

/// Lifecycle status of a ledger row. Rows are never deleted, only archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementStatus {
    Active,
    Deleted,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Active => "ACTIVE",
            MovementStatus::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(MovementStatus::Active),
            "DELETED" => Some(MovementStatus::Deleted),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MovementStatus::Active => "Active",
            MovementStatus::Deleted => "Archived",
        }
    }
}

/// Business object a movement points back at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    Order,
    ExcelBatch,
    VariantInit,
    StockCount,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Order => "ORDER",
            ReferenceType::ExcelBatch => "EXCEL_BATCH",
            ReferenceType::VariantInit => "VARIANT_INIT",
            ReferenceType::StockCount => "STOCK_COUNT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ORDER" => Some(ReferenceType::Order),
            "EXCEL_BATCH" => Some(ReferenceType::ExcelBatch),
            "VARIANT_INIT" => Some(ReferenceType::VariantInit),
            "STOCK_COUNT" => Some(ReferenceType::StockCount),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub movement_type: String,
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub movement_date: DateTime<Utc>,
    pub performed_by: Option<Uuid>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        MovementType::from_str(&self.movement_type)
    }

    pub fn status(&self) -> Option<MovementStatus> {
        MovementStatus::from_str(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status() == Some(MovementStatus::Active)
    }

    /// Change this row applied to the aggregate when it was written.
    pub fn signed_delta(&self) -> i32 {
        self.new_stock - self.previous_stock
    }

    /// Reporting bucket for this row. FollowsDelta types resolve from the
    /// recorded delta; everything else uses the static classification.
    pub fn resolved_category(&self) -> MovementCategory {
        let Some(movement_type) = self.movement_type() else {
            return MovementCategory::Informational;
        };
        match movement_type.classification().effect {
            StockEffect::FollowsDelta => {
                if self.new_stock > self.previous_stock {
                    MovementCategory::StockIn
                } else if self.new_stock < self.previous_stock {
                    MovementCategory::StockOut
                } else {
                    MovementCategory::Informational
                }
            }
            _ => movement_type.classification().category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_TYPES: [MovementType; 10] = [
        MovementType::InitialStock,
        MovementType::StockIn,
        MovementType::StockOut,
        MovementType::AdjustmentIn,
        MovementType::AdjustmentOut,
        MovementType::OrderReserved,
        MovementType::OrderCancelledReturn,
        MovementType::ExcelImport,
        MovementType::ExcelUpdate,
        MovementType::StockCount,
    ];

    #[test]
    fn string_codes_round_trip() {
        for movement_type in ALL_TYPES {
            assert_eq!(
                MovementType::from_str(movement_type.as_str()),
                Some(movement_type)
            );
        }
        assert_eq!(MovementType::from_str("NOT_A_TYPE"), None);
    }

    #[test]
    fn fixed_effect_types_match_their_category() {
        for movement_type in ALL_TYPES {
            let class = movement_type.classification();
            match class.effect {
                StockEffect::Increase => {
                    assert_eq!(class.category, MovementCategory::StockIn)
                }
                StockEffect::Decrease => {
                    assert_eq!(class.category, MovementCategory::StockOut)
                }
                StockEffect::Neutral | StockEffect::FollowsDelta => {
                    assert_eq!(class.category, MovementCategory::Informational)
                }
            }
        }
    }

    #[test]
    fn stock_count_never_permits_a_change() {
        assert!(MovementType::StockCount.permits_delta(70, 70));
        assert!(!MovementType::StockCount.permits_delta(70, 71));
    }

    #[test]
    fn excel_update_category_follows_recorded_delta() {
        let mut row = sample_row(MovementType::ExcelUpdate, 50, 80);
        assert_eq!(row.resolved_category(), MovementCategory::StockIn);
        row.previous_stock = 80;
        row.new_stock = 50;
        assert_eq!(row.resolved_category(), MovementCategory::StockOut);
    }

    fn sample_row(movement_type: MovementType, previous: i32, new: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            movement_type: movement_type.as_str().to_string(),
            quantity: (new - previous).abs(),
            previous_stock: previous,
            new_stock: new,
            movement_date: Utc::now(),
            performed_by: None,
            reference_type: None,
            reference_id: None,
            document_number: None,
            notes: None,
            unit_cost: None,
            batch_number: None,
            expiry_date: None,
            status: MovementStatus::Active.as_str().to_string(),
            created_at: Utc::now(),
        }
    }

    proptest! {
        // For any legal transition, the recorded delta always equals
        // +quantity for in-classified rows and -quantity for out-classified
        // rows, with zero reserved for informational rows.
        #[test]
        fn signed_delta_matches_classification(
            type_idx in 0usize..ALL_TYPES.len(),
            previous in 0i32..10_000,
            new in 0i32..10_000,
        ) {
            let movement_type = ALL_TYPES[type_idx];
            prop_assume!(movement_type.permits_delta(previous, new));
            let row = sample_row(movement_type, previous, new);
            match row.resolved_category() {
                MovementCategory::StockIn => {
                    prop_assert_eq!(row.signed_delta(), row.quantity)
                }
                MovementCategory::StockOut => {
                    prop_assert_eq!(row.signed_delta(), -row.quantity)
                }
                MovementCategory::Informational => {
                    prop_assert_eq!(row.signed_delta(), 0)
                }
            }
        }
    }
}
