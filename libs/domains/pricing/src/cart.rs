use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PricingError, PricingResult};
use crate::line_item::LineItem;
use crate::usage::Product;

/// Destination of composed line items
///
/// Implementations own ordering and persistence; the pricing core only
/// appends, removes and reads back.
pub trait CartAccumulator {
    /// Append an item, overriding its price when a total was precomputed;
    /// returns the id assigned to the entry
    fn add_item(&mut self, item: LineItem, precomputed_total: Option<f64>) -> Uuid;

    /// Remove the entry at `index` along with the readonly items of its group
    fn remove(&mut self, index: usize) -> PricingResult<LineItem>;

    /// Entries in insertion order
    fn get(&self) -> &[LineItem];

    /// Ids of the entries of `product` that may be removed or edited
    fn removable_ids(&self, product: Product) -> Vec<Uuid>;
}

/// Per-product aggregate of a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSubtotal {
    pub product: Product,
    pub display_name: String,
    pub items: usize,
    pub subtotal: f64,
}

/// Vec-backed cart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryCart {
    items: Vec<LineItem>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Monthly total of every entry
    pub fn total(&self) -> f64 {
        self.items.iter().map(LineItem::total).sum()
    }

    /// Subtotals by product, in product order
    pub fn grouped(&self) -> Vec<ProductSubtotal> {
        let mut groups: BTreeMap<Product, ProductSubtotal> = BTreeMap::new();
        for item in &self.items {
            let group = groups.entry(item.product).or_insert_with(|| ProductSubtotal {
                product: item.product,
                display_name: item.product.display_name().to_string(),
                items: 0,
                subtotal: 0.0,
            });
            group.items += 1;
            group.subtotal += item.total();
        }
        groups.into_values().collect()
    }

    pub fn position(&self, unique_id: Uuid) -> Option<usize> {
        self.items.iter().position(|i| i.unique_id == Some(unique_id))
    }

    /// Remove an entry (and its readonly companions) by id
    pub fn take(&mut self, unique_id: Uuid) -> PricingResult<LineItem> {
        let index = self
            .position(unique_id)
            .ok_or_else(|| PricingError::CartEntryNotFound(unique_id.to_string()))?;
        self.remove(index)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl CartAccumulator for InMemoryCart {
    fn add_item(&mut self, mut item: LineItem, precomputed_total: Option<f64>) -> Uuid {
        let id = Uuid::new_v4();
        item.unique_id = Some(id);
        if precomputed_total.is_some() {
            item.price = precomputed_total;
        }
        debug!(id = %id, product = %item.product, sku = %item.sku, "Item added to cart");
        self.items.push(item);
        id
    }

    fn remove(&mut self, index: usize) -> PricingResult<LineItem> {
        if index >= self.items.len() {
            return Err(PricingError::CartEntryNotFound(format!(
                "index {} (cart has {} items)",
                index,
                self.items.len()
            )));
        }

        let removed = self.items.remove(index);
        if let (Some(group_id), false) = (removed.group_id, removed.readonly) {
            self.items
                .retain(|i| !(i.readonly && i.group_id == Some(group_id)));
        }
        debug!(product = %removed.product, sku = %removed.sku, "Item removed from cart");
        Ok(removed)
    }

    fn get(&self) -> &[LineItem] {
        &self.items
    }

    fn removable_ids(&self, product: Product) -> Vec<Uuid> {
        self.items
            .iter()
            .filter(|i| i.product == product && !i.readonly)
            .filter_map(|i| i.unique_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageSpec;

    fn item(product: Product, unit_price: f64, quantity: f64) -> LineItem {
        LineItem::new(&UsageSpec::default_for(product), "SKU")
            .with_unit_price(unit_price)
            .with_quantity(quantity, "units")
    }

    #[test]
    fn test_add_assigns_ids_and_overrides_price() {
        let mut cart = InMemoryCart::new();
        let first = cart.add_item(item(Product::CloudStorage, 1.0, 2.0), None);
        let second = cart.add_item(item(Product::CloudStorage, 1.0, 2.0), Some(5.0));

        assert_ne!(first, second);
        assert_eq!(cart.get()[0].unique_id, Some(first));
        assert_eq!(cart.get()[1].total(), 5.0);
        assert_eq!(cart.total(), 7.0);
    }

    #[test]
    fn test_grouped_subtotals() {
        let mut cart = InMemoryCart::new();
        cart.add_item(item(Product::NetworkEgress, 1.0, 1.0), None);
        cart.add_item(item(Product::ComputeEngine, 2.0, 3.0), None);
        cart.add_item(item(Product::NetworkEgress, 1.0, 4.0), None);

        let groups = cart.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].product, Product::ComputeEngine);
        assert_eq!(groups[0].subtotal, 6.0);
        assert_eq!(groups[1].items, 2);
        assert_eq!(groups[1].subtotal, 5.0);
    }

    #[test]
    fn test_remove_drops_readonly_companions() {
        let group = Uuid::new_v4();
        let mut primary = item(Product::ComputeEngine, 1.0, 1.0);
        primary.group_id = Some(group);
        let mut disk = item(Product::PersistentDisk, 1.0, 1.0);
        disk.group_id = Some(group);
        disk.readonly = true;

        let mut cart = InMemoryCart::new();
        cart.add_item(item(Product::CloudStorage, 1.0, 1.0), None);
        let id = cart.add_item(primary, None);
        cart.add_item(disk, None);

        assert_eq!(cart.removable_ids(Product::PersistentDisk), Vec::<Uuid>::new());
        assert_eq!(cart.removable_ids(Product::ComputeEngine), vec![id]);

        let removed = cart.take(id).unwrap();
        assert_eq!(removed.product, Product::ComputeEngine);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get()[0].product, Product::CloudStorage);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut cart = InMemoryCart::new();
        assert!(matches!(
            cart.remove(0),
            Err(PricingError::CartEntryNotFound(_))
        ));
        assert!(cart.take(Uuid::new_v4()).is_err());
    }
}
