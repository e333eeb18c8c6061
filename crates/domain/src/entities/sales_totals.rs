//! Unrounded aggregates as produced by the sales store

use serde::{Deserialize, Serialize};

use crate::value_objects::{PharmacyId, ProductCode};

/// Whole-window totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesTotals {
    /// Sum of `quantity * unit price` over matched sales
    pub revenue: f64,
    pub pharmacy_count: u64,
    pub product_count: u64,
    pub transaction_count: u64,
}

/// Revenue of one pharmacy over the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyTotals {
    pub pharmacy_id: PharmacyId,
    pub name: Option<String>,
    pub area: Option<String>,
    pub revenue: f64,
    pub transaction_count: u64,
}

/// Revenue of one product over the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTotals {
    pub code: ProductCode,
    pub name: Option<String>,
    pub category: Option<String>,
    pub revenue: f64,
    pub quantity: i64,
    pub average_price: f64,
}
