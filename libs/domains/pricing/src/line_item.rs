//! Priced cart entries
//!
//! A `LineItem` carries everything needed to display it and, through its
//! `EditHook`, to rebuild the usage spec that produced it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::PricingResult;
use crate::machine::MachineFamilyTable;
use crate::migration::migrate_inputs;
use crate::usage::{Product, ProductUsage, UsageSpec};

/// Snapshot of the inputs behind a line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHook {
    pub initial_inputs: UsageSpec,
    pub product: Product,
    pub tab: String,
}

impl EditHook {
    pub fn capture(spec: &UsageSpec) -> Self {
        let product = spec.product();
        Self {
            initial_inputs: spec.clone(),
            product,
            tab: product.tab().to_string(),
        }
    }

    /// Rebuild a hook from a stored snapshot, normalizing legacy inputs first
    pub fn from_value(mut value: Value, machines: &MachineFamilyTable) -> PricingResult<Self> {
        let product: Product = serde_json::from_value(value["product"].clone())?;
        if let Some(inputs) = value.get_mut("initialInputs") {
            migrate_inputs(product, inputs, machines)?;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The usage spec to load back into the product's session slot
    pub fn restore(&self) -> UsageSpec {
        self.initial_inputs.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Assigned by the cart on insertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<Uuid>,
    pub product: Product,
    pub sku: String,
    pub region: String,
    pub quantity: f64,
    pub quantity_label: String,
    pub display_name: String,
    pub display_description: String,
    pub unit_price: f64,
    /// `None` means `unit_price * quantity`
    pub price: Option<f64>,
    /// Sub-costs and details for the breakdown view
    #[serde(default)]
    pub items: BTreeMap<String, Value>,
    pub edit_hook: EditHook,
    /// Shared by a primary item and its accompanying items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    /// Accompanying items are not edited on their own
    #[serde(default)]
    pub readonly: bool,
}

impl LineItem {
    pub fn new(spec: &UsageSpec, sku: impl Into<String>) -> Self {
        let product = spec.product();
        Self {
            unique_id: None,
            product,
            sku: sku.into(),
            region: spec.region().to_string(),
            quantity: 0.0,
            quantity_label: String::new(),
            display_name: product.display_name().to_string(),
            display_description: String::new(),
            unit_price: 0.0,
            price: None,
            items: BTreeMap::new(),
            edit_hook: EditHook::capture(spec),
            group_id: None,
            readonly: false,
        }
    }

    pub fn with_quantity(mut self, quantity: f64, label: impl Into<String>) -> Self {
        self.quantity = quantity;
        self.quantity_label = label.into();
        self
    }

    pub fn with_display(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.display_name = name.into();
        self.display_description = description.into();
        self
    }

    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn with_price(mut self, price: Option<f64>) -> Self {
        self.price = price;
        self
    }

    pub fn with_items(mut self, items: BTreeMap<String, Value>) -> Self {
        self.items = items;
        self
    }

    /// Monthly cost of the item
    pub fn total(&self) -> f64 {
        self.price.unwrap_or(self.unit_price * self.quantity)
    }

    /// Deserialize a stored item, normalizing a legacy edit hook on the way
    pub fn from_value(mut value: Value, machines: &MachineFamilyTable) -> PricingResult<Self> {
        if let Some(hook) = value.get_mut("editHook") {
            let restored = EditHook::from_value(hook.take(), machines)?;
            *hook = serde_json::to_value(restored)?;
        }
        Ok(serde_json::from_value(value)?)
    }
}
