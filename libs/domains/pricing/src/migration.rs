//! Legacy snapshot normalization
//!
//! Older edit hooks stored compute inputs keyed by a machine name
//! (`{"instance": "n1-standard-2", "class": "regular"}`) and used `location`,
//! `quantity` and `cud` instead of `region`, `instances` and `commitment`.
//! Snapshots are rewritten into the current layout once, when an edit hook
//! is restored, so nothing downstream sees the old shapes.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PricingError, PricingResult};
use crate::machine::{MachineFamilyTable, MachineSelection};
use crate::usage::Product;

/// Rename `from` to `to` unless `to` is already present
fn rename_key(inputs: &mut Map<String, Value>, from: &str, to: &str) -> bool {
    if inputs.contains_key(to) {
        return false;
    }
    match inputs.remove(from) {
        Some(value) => {
            inputs.insert(to.to_string(), value);
            true
        }
        None => false,
    }
}

/// Normalize one product's initial inputs in place; returns whether anything changed
pub fn migrate_inputs(
    product: Product,
    inputs: &mut Value,
    machines: &MachineFamilyTable,
) -> PricingResult<bool> {
    let Some(map) = inputs.as_object_mut() else {
        return Err(PricingError::InvalidInput(
            "Edit snapshot inputs must be an object".to_string(),
        ));
    };

    let mut changed = rename_key(map, "location", "region");
    if product == Product::ComputeEngine {
        changed |= migrate_compute(map, machines)?;
    }
    if !map.contains_key("product") {
        map.insert("product".to_string(), serde_json::to_value(product)?);
        changed = true;
    }

    if changed {
        debug!(product = %product, "Migrated legacy edit snapshot");
    }
    Ok(changed)
}

fn migrate_compute(
    map: &mut Map<String, Value>,
    machines: &MachineFamilyTable,
) -> PricingResult<bool> {
    let mut changed = rename_key(map, "quantity", "instances");
    changed |= rename_key(map, "cud", "commitment");

    if let Some(class) = map.remove("class") {
        let preemptible = class.as_str() == Some("preemptible");
        map.entry("preemptible").or_insert(Value::Bool(preemptible));
        changed = true;
    }

    if map.contains_key("machine") {
        map.remove("instance");
        return Ok(changed);
    }

    let Some(instance) = map.remove("instance") else {
        return Ok(changed);
    };
    let name = instance.as_str().ok_or_else(|| {
        PricingError::InvalidInput("Legacy instance must be a machine name".to_string())
    })?;

    let mut selection = if name == "custom" {
        legacy_custom(map, machines)?
    } else {
        machines.parse_machine_name(name)?
    };
    if let Some(extended) = map.remove("extendedMemory").and_then(|v| v.as_bool()) {
        selection.extended_memory = selection.extended_memory || extended;
    }
    for key in ["family", "series", "customCores", "customRam"] {
        map.remove(key);
    }

    map.insert("machine".to_string(), serde_json::to_value(selection)?);
    Ok(true)
}

/// `{"instance": "custom", "series": "n2", "customCores": 4, "customRam": 16}`
fn legacy_custom(
    map: &Map<String, Value>,
    machines: &MachineFamilyTable,
) -> PricingResult<MachineSelection> {
    let series = map.get("series").and_then(Value::as_str).unwrap_or("n1");
    let cores = map
        .get("customCores")
        .and_then(Value::as_u64)
        .ok_or_else(|| PricingError::InvalidInput("Legacy custom shape without cores".to_string()))?;
    let ram_gb = map
        .get("customRam")
        .and_then(Value::as_f64)
        .ok_or_else(|| PricingError::InvalidInput("Legacy custom shape without RAM".to_string()))?;

    let family = machines
        .family_of(series)
        .ok_or_else(|| PricingError::InvalidShape(format!("Unknown machine series {}", series)))?;
    let cores = u32::try_from(cores)
        .map_err(|_| PricingError::InvalidShape(format!("{} vCPUs is out of range", cores)))?;

    Ok(MachineSelection::custom(
        &family.name,
        series,
        cores,
        ram_gb,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageSpec;
    use serde_json::json;

    fn machines() -> MachineFamilyTable {
        MachineFamilyTable::builtin().unwrap()
    }

    #[test]
    fn test_legacy_compute_snapshot() {
        let mut inputs = json!({
            "instance": "n1-standard-2",
            "class": "regular",
            "location": "europe-west1",
            "quantity": 3,
            "cud": 1
        });
        assert!(migrate_inputs(Product::ComputeEngine, &mut inputs, &machines()).unwrap());

        let spec: UsageSpec = serde_json::from_value(inputs).unwrap();
        let UsageSpec::ComputeEngine(compute) = spec else {
            panic!("expected compute spec");
        };
        assert_eq!(compute.region, "europe-west1");
        assert_eq!(compute.instances, 3);
        assert!(!compute.preemptible);
        assert_eq!(compute.commitment.years(), 1);
        assert_eq!(
            compute.machine,
            MachineSelection::predefined("gp", "n1", "standard", 2)
        );
    }

    #[test]
    fn test_legacy_preemptible_class() {
        let mut inputs = json!({ "instance": "e2-small", "class": "preemptible" });
        migrate_inputs(Product::ComputeEngine, &mut inputs, &machines()).unwrap();
        assert_eq!(inputs["preemptible"], true);
        assert_eq!(inputs["machine"]["series"], "e2");
    }

    #[test]
    fn test_legacy_custom_shape() {
        let mut inputs = json!({
            "instance": "custom",
            "series": "n2",
            "customCores": 4,
            "customRam": 40,
            "extendedMemory": true
        });
        migrate_inputs(Product::ComputeEngine, &mut inputs, &machines()).unwrap();

        let machine: MachineSelection =
            serde_json::from_value(inputs["machine"].clone()).unwrap();
        assert_eq!(
            machine,
            MachineSelection::custom("gp", "n2", 4, 40.0).with_extended_memory(true)
        );
        assert!(inputs.get("customCores").is_none());
    }

    #[test]
    fn test_current_snapshot_untouched() {
        let spec = UsageSpec::default_for(Product::ComputeEngine);
        let mut inputs = serde_json::to_value(&spec).unwrap();
        let before = inputs.clone();
        assert!(!migrate_inputs(Product::ComputeEngine, &mut inputs, &machines()).unwrap());
        assert_eq!(inputs, before);
    }

    #[test]
    fn test_location_renamed_for_every_product() {
        let mut inputs = json!({ "location": "asia-east1", "worldwide": { "value": 1, "unit": 3 } });
        migrate_inputs(Product::NetworkEgress, &mut inputs, &machines()).unwrap();
        assert_eq!(inputs["region"], "asia-east1");
        assert_eq!(inputs["product"], "network_egress");
    }

    #[test]
    fn test_unknown_legacy_machine() {
        let mut inputs = json!({ "instance": "f1-micro" });
        assert!(migrate_inputs(Product::ComputeEngine, &mut inputs, &machines()).is_err());
    }

    #[test]
    fn test_non_object_inputs() {
        let mut inputs = json!([1, 2, 3]);
        assert!(matches!(
            migrate_inputs(Product::CloudStorage, &mut inputs, &machines()),
            Err(PricingError::InvalidInput(_))
        ));
    }
}
