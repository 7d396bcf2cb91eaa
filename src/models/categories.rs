//! Closed category enumerations for receipts and line items
//!
//! Both sets are fixed: extraction output is coerced into them before
//! anything is persisted, so the store never sees free-text categories.
//! Labels double as the wire format (store columns and extraction prompt).

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Budgeting bucket for a whole receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    Groceries,
    RestaurantsDining,
    Transportation,
    Fuel,
    HomeUtilities,
    ShoppingEntertainment,
    Health,
    Travel,
    PersonalFamilyCare,
    Education,
    BusinessExpenses,
    Finance,
    Giving,
    CashChecksMisc,
    Uncategorized,
}

impl ExpenseCategory {
    /// Every member, in display order (also the order embedded in the
    /// extraction prompt).
    pub const ALL: [ExpenseCategory; 15] = [
        ExpenseCategory::Groceries,
        ExpenseCategory::RestaurantsDining,
        ExpenseCategory::Transportation,
        ExpenseCategory::Fuel,
        ExpenseCategory::HomeUtilities,
        ExpenseCategory::ShoppingEntertainment,
        ExpenseCategory::Health,
        ExpenseCategory::Travel,
        ExpenseCategory::PersonalFamilyCare,
        ExpenseCategory::Education,
        ExpenseCategory::BusinessExpenses,
        ExpenseCategory::Finance,
        ExpenseCategory::Giving,
        ExpenseCategory::CashChecksMisc,
        ExpenseCategory::Uncategorized,
    ];

    /// Canonical label (store column value and prompt vocabulary).
    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Groceries => "Groceries",
            ExpenseCategory::RestaurantsDining => "Restaurants & Dining",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Fuel => "Fuel",
            ExpenseCategory::HomeUtilities => "Home & Utilities",
            ExpenseCategory::ShoppingEntertainment => "Shopping & Entertainment",
            ExpenseCategory::Health => "Health",
            ExpenseCategory::Travel => "Travel",
            ExpenseCategory::PersonalFamilyCare => "Personal & Family Care",
            ExpenseCategory::Education => "Education",
            ExpenseCategory::BusinessExpenses => "Business Expenses",
            ExpenseCategory::Finance => "Finance",
            ExpenseCategory::Giving => "Giving",
            ExpenseCategory::CashChecksMisc => "Cash, Checks & Misc",
            ExpenseCategory::Uncategorized => "Uncategorized",
        }
    }

    /// Glyph used in chat acknowledgments. Unmapped members share the
    /// generic receipt glyph.
    pub fn glyph(&self) -> &'static str {
        match self {
            ExpenseCategory::Groceries => "🛒",
            ExpenseCategory::RestaurantsDining => "🍽️",
            ExpenseCategory::Transportation => "🚗",
            ExpenseCategory::Fuel => "⛽",
            ExpenseCategory::HomeUtilities => "🏠",
            ExpenseCategory::ShoppingEntertainment => "🛍️",
            ExpenseCategory::Health => "🏥",
            ExpenseCategory::Travel => "✈️",
            ExpenseCategory::PersonalFamilyCare => "🧴",
            ExpenseCategory::Education => "🎓",
            ExpenseCategory::BusinessExpenses => "💼",
            ExpenseCategory::Finance => "🏦",
            ExpenseCategory::Giving => "🎁",
            ExpenseCategory::CashChecksMisc => "💵",
            ExpenseCategory::Uncategorized => "🧾",
        }
    }

    /// Case-insensitive exact-label lookup.
    pub fn from_label(label: &str) -> Option<ExpenseCategory> {
        let wanted = label.trim();
        ExpenseCategory::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
    }

    /// Coerce extraction output into the closed set. Anything absent or
    /// outside the set becomes `Uncategorized`.
    pub fn coerce(label: Option<&str>) -> ExpenseCategory {
        label
            .and_then(ExpenseCategory::from_label)
            .unwrap_or(ExpenseCategory::Uncategorized)
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ExpenseCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ExpenseCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        // Lenient by design: rows written under an older contract must
        // still load, so unknown labels collapse to the fallback member.
        Ok(ExpenseCategory::coerce(Some(&label)))
    }
}

/// Grocery/product bucket for an individual line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Fruits,
    Vegetables,
    MeatFish,
    DairyEggs,
    GrainsStaples,
    FrozenFoods,
    SnacksSweets,
    CondimentsCooking,
    Toiletries,
    Misc,
}

impl ItemCategory {
    /// Every member, in display order.
    pub const ALL: [ItemCategory; 10] = [
        ItemCategory::Fruits,
        ItemCategory::Vegetables,
        ItemCategory::MeatFish,
        ItemCategory::DairyEggs,
        ItemCategory::GrainsStaples,
        ItemCategory::FrozenFoods,
        ItemCategory::SnacksSweets,
        ItemCategory::CondimentsCooking,
        ItemCategory::Toiletries,
        ItemCategory::Misc,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ItemCategory::Fruits => "Fruits",
            ItemCategory::Vegetables => "Vegetables",
            ItemCategory::MeatFish => "Meat / Fish",
            ItemCategory::DairyEggs => "Dairy & Eggs",
            ItemCategory::GrainsStaples => "Grains & Staples",
            ItemCategory::FrozenFoods => "Frozen Foods",
            ItemCategory::SnacksSweets => "Snacks & Sweets",
            ItemCategory::CondimentsCooking => "Condiments & Cooking Ingredients",
            ItemCategory::Toiletries => "Toiletries",
            ItemCategory::Misc => "Misc",
        }
    }

    /// Case-insensitive exact-label lookup. Accepts the first contract
    /// revision's "Toiletries/Cleaning" wording for `Toiletries`.
    pub fn from_label(label: &str) -> Option<ItemCategory> {
        let wanted = label.trim();
        if wanted.eq_ignore_ascii_case("Toiletries/Cleaning") {
            return Some(ItemCategory::Toiletries);
        }
        ItemCategory::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
    }

    /// Coerce extraction output into the closed set, falling back to `Misc`.
    pub fn coerce(label: Option<&str>) -> ItemCategory {
        label
            .and_then(ItemCategory::from_label)
            .unwrap_or(ItemCategory::Misc)
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ItemCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ItemCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(ItemCategory::coerce(Some(&label)))
    }
}
