//! Pricing snapshot builder.
//!
//! Proposals store their manufacturer/item/modification data as a JSON blob
//! that legacy writers occasionally double-string-encode. This module peels
//! up to two levels of string encoding, recomputes totals from item-level
//! data (the stored per-block summary is advisory and goes stale relative to
//! item edits), and freezes the result into an owned [`PricingSnapshot`]
//! embedded in the order at acceptance time.
//!
//! Monetary math runs at full [`Decimal`] precision; two-digit rounding is
//! applied once, at the snapshot boundary.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("manufacturer data is not valid JSON: {0}")]
    Malformed(String),
    #[error("manufacturer data is still string-encoded after two decode passes")]
    NestedEncoding,
    #[error("manufacturer data has an unexpected shape: {0}")]
    Shape(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Modification {
    pub name: String,
    pub cost: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogItem {
    pub id: Option<i64>,
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub assembly_fee: Decimal,
    pub taxable: bool,
    pub category: Option<String>,
    pub modifications: Vec<Modification>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomItem {
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taxable: bool,
}

/// Totals as last written by the authoring UI. Trusted only where item-level
/// data is absent; otherwise the builder recomputes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSummary {
    pub cabinets: Decimal,
    pub assembly_fee: Decimal,
    #[serde(alias = "modifications")]
    pub modifications_cost: Decimal,
    pub style_total: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub delivery_fee: Decimal,
    pub tax_rate: Decimal,
    #[serde(alias = "tax")]
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManufacturerBlock {
    pub manufacturer: Option<i64>,
    pub manufacturer_name: String,
    pub selected_style: Option<i64>,
    pub style_name: String,
    pub style_color: Option<String>,
    pub items: Vec<CatalogItem>,
    pub custom_items: Vec<CustomItem>,
    pub summary: StoredSummary,
}

/// Frozen per-style totals, rounded to two digits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSummary {
    pub manufacturer_name: String,
    pub style_name: String,
    pub cabinets: Decimal,
    pub assembly_fee: Decimal,
    pub modifications_cost: Decimal,
    pub style_total: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub delivery_fee: Decimal,
    pub grand_total: Decimal,
}

/// Immutable acceptance-time pricing. Fully owned; never references the live
/// proposal blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSnapshot {
    pub styles: Vec<StyleSummary>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub delivery_fee: Decimal,
    pub grand_total: Decimal,
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decode the manufacturer blob, peeling up to two levels of string
/// encoding. Fails closed on malformed input at any depth; an accepted
/// order must never carry a silently zeroed snapshot.
pub fn decode_manufacturers_data(raw: &Value) -> Result<Vec<ManufacturerBlock>, PricingError> {
    let mut value = raw.clone();
    for _ in 0..2 {
        match value {
            Value::String(encoded) => {
                value = serde_json::from_str(&encoded)
                    .map_err(|error| PricingError::Malformed(error.to_string()))?;
            }
            _ => break,
        }
    }

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(_) => Err(PricingError::NestedEncoding),
        array @ Value::Array(_) => serde_json::from_value(array)
            .map_err(|error| PricingError::Shape(error.to_string())),
        object @ Value::Object(_) => serde_json::from_value::<ManufacturerBlock>(object)
            .map(|block| vec![block])
            .map_err(|error| PricingError::Shape(error.to_string())),
        other => Err(PricingError::Shape(format!("expected array of manufacturer blocks, got {other}"))),
    }
}

struct BlockTotals {
    summary: StyleSummary,
    total: Decimal,
    tax_amount: Decimal,
    delivery_fee: Decimal,
    grand_total: Decimal,
}

fn price_block(block: &ManufacturerBlock, multiplier: Decimal) -> BlockTotals {
    let stored = &block.summary;

    let item_cabinets: Decimal =
        block.items.iter().map(|item| item.price * multiplier * item.quantity).sum();
    let custom_cabinets: Decimal =
        block.custom_items.iter().map(|item| item.price * multiplier * item.quantity).sum();
    let cabinets = if block.items.is_empty() && block.custom_items.is_empty() {
        // Summary-only legacy block: nothing to recompute from.
        stored.cabinets
    } else {
        item_cabinets + custom_cabinets
    };

    let computed_assembly: Decimal =
        block.items.iter().map(|item| item.assembly_fee * item.quantity).sum();
    let assembly_fee =
        if computed_assembly.is_zero() { stored.assembly_fee } else { computed_assembly };

    // The stored modifications total is a known stale-zero hazard: item
    // edits add modification costs without refreshing the summary. Item
    // data wins whenever it exists.
    let computed_modifications: Decimal = block
        .items
        .iter()
        .map(|item| {
            let per_unit: Decimal = item.modifications.iter().map(|m| m.cost).sum();
            per_unit * item.quantity
        })
        .sum();
    let modifications_cost = if computed_modifications.is_zero() {
        stored.modifications_cost
    } else {
        computed_modifications
    };

    let style_total = cabinets + assembly_fee + modifications_cost;

    let discount_amount = if stored.discount_percent > Decimal::ZERO {
        style_total * stored.discount_percent / Decimal::from(100)
    } else {
        stored.discount_amount
    };

    let total = style_total - discount_amount;
    let tax_amount = total * stored.tax_rate / Decimal::from(100);
    let delivery_fee = stored.delivery_fee;
    let grand_total = total + tax_amount + delivery_fee;

    BlockTotals {
        summary: StyleSummary {
            manufacturer_name: block.manufacturer_name.clone(),
            style_name: block.style_name.clone(),
            cabinets: round2(cabinets),
            assembly_fee: round2(assembly_fee),
            modifications_cost: round2(modifications_cost),
            style_total: round2(style_total),
            discount_amount: round2(discount_amount),
            total: round2(total),
            tax_rate: stored.tax_rate,
            tax_amount: round2(tax_amount),
            delivery_fee: round2(delivery_fee),
            grand_total: round2(grand_total),
        },
        total,
        tax_amount,
        delivery_fee,
        grand_total,
    }
}

pub fn build_snapshot(blocks: &[ManufacturerBlock], multiplier: Decimal) -> PricingSnapshot {
    let mut styles = Vec::with_capacity(blocks.len());
    let mut subtotal = Decimal::ZERO;
    let mut tax_amount = Decimal::ZERO;
    let mut delivery_fee = Decimal::ZERO;
    let mut grand_total = Decimal::ZERO;

    for block in blocks {
        let priced = price_block(block, multiplier);
        subtotal += priced.total;
        tax_amount += priced.tax_amount;
        delivery_fee += priced.delivery_fee;
        grand_total += priced.grand_total;
        styles.push(priced.summary);
    }

    PricingSnapshot {
        styles,
        subtotal: round2(subtotal),
        tax_amount: round2(tax_amount),
        delivery_fee: round2(delivery_fee),
        grand_total: round2(grand_total),
    }
}

pub fn snapshot_from_value(raw: &Value, multiplier: Decimal) -> Result<PricingSnapshot, PricingError> {
    let blocks = decode_manufacturers_data(raw)?;
    Ok(build_snapshot(&blocks, multiplier))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::{decode_manufacturers_data, snapshot_from_value, PricingError};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn kitchen_block() -> Value {
        json!([{
            "manufacturer": 1,
            "manufacturerName": "Artisan Casework",
            "selectedStyle": 3,
            "styleName": "Shaker Moss",
            "items": [{
                "id": 11,
                "name": "B12 - 12\" Base Cabinet",
                "price": 171,
                "quantity": 1,
                "assemblyFee": 100,
                "taxable": true,
                "modifications": [{"name": "Depth reduction", "cost": 130}]
            }],
            "customItems": [],
            "summary": {
                "cabinets": 0,
                "assemblyFee": 0,
                "modificationsCost": 0,
                "discountPercent": 0,
                "discountAmount": 0,
                "deliveryFee": 200,
                "taxRate": 6.67
            }
        }])
    }

    #[test]
    fn computes_the_reference_kitchen_totals() {
        let snapshot = snapshot_from_value(&kitchen_block(), Decimal::ONE).expect("snapshot");
        let style = &snapshot.styles[0];

        assert_eq!(style.cabinets, dec("171.00"));
        assert_eq!(style.assembly_fee, dec("100.00"));
        assert_eq!(style.modifications_cost, dec("130.00"));
        assert_eq!(style.style_total, dec("401.00"));
        assert_eq!(style.discount_amount, dec("0.00"));
        assert_eq!(style.total, dec("401.00"));
        // 401 * 6.67% = 26.7467, rounded once at the boundary.
        assert_eq!(style.tax_amount, dec("26.75"));
        assert_eq!(style.grand_total, dec("627.75"));

        assert_eq!(snapshot.subtotal, dec("401.00"));
        assert_eq!(snapshot.delivery_fee, dec("200.00"));
        assert_eq!(snapshot.grand_total, dec("627.75"));
    }

    #[test]
    fn single_and_double_encoded_payloads_build_identical_snapshots() {
        let plain = kitchen_block();
        let once = Value::String(serde_json::to_string(&plain).expect("encode"));
        let twice = Value::String(serde_json::to_string(&once).expect("encode"));

        let from_plain = snapshot_from_value(&plain, Decimal::ONE).expect("plain");
        let from_once = snapshot_from_value(&once, Decimal::ONE).expect("once");
        let from_twice = snapshot_from_value(&twice, Decimal::ONE).expect("twice");

        assert_eq!(from_plain, from_once);
        assert_eq!(from_plain, from_twice);
    }

    #[test]
    fn malformed_payloads_fail_closed() {
        let garbage = Value::String("{not json".to_owned());
        assert!(matches!(
            snapshot_from_value(&garbage, Decimal::ONE),
            Err(PricingError::Malformed(_))
        ));

        let nested_garbage = Value::String(
            serde_json::to_string(&Value::String("still {broken".to_owned())).expect("encode"),
        );
        assert!(matches!(
            snapshot_from_value(&nested_garbage, Decimal::ONE),
            Err(PricingError::Malformed(_))
        ));

        let numeric = json!(42);
        assert!(matches!(snapshot_from_value(&numeric, Decimal::ONE), Err(PricingError::Shape(_))));
    }

    #[test]
    fn triple_encoded_payloads_are_rejected_not_decoded() {
        let plain = kitchen_block();
        let once = Value::String(serde_json::to_string(&plain).expect("encode"));
        let twice = Value::String(serde_json::to_string(&once).expect("encode"));
        let thrice = Value::String(serde_json::to_string(&twice).expect("encode"));

        assert_eq!(
            snapshot_from_value(&thrice, Decimal::ONE),
            Err(PricingError::NestedEncoding)
        );
    }

    #[test]
    fn absent_blob_prices_to_zero_without_error() {
        let snapshot = snapshot_from_value(&Value::Null, Decimal::ONE).expect("empty");
        assert!(snapshot.styles.is_empty());
        assert_eq!(snapshot.grand_total, Decimal::ZERO);
    }

    #[test]
    fn stale_zero_summary_is_recomputed_from_item_modifications() {
        // Summary written before the modification was added still says 0.
        let blob = json!([{
            "manufacturerName": "Artisan Casework",
            "styleName": "Shaker Moss",
            "items": [{
                "name": "W15",
                "price": 130,
                "quantity": 2,
                "modifications": [{"name": "Glass door", "cost": 45}]
            }],
            "summary": {"modificationsCost": 0, "taxRate": 0, "deliveryFee": 0}
        }]);

        let snapshot = snapshot_from_value(&blob, Decimal::ONE).expect("snapshot");
        assert_eq!(snapshot.styles[0].modifications_cost, dec("90.00"));
        assert_eq!(snapshot.styles[0].style_total, dec("350.00"));
    }

    #[test]
    fn summary_only_blocks_fall_back_to_stored_totals() {
        let blob = json!([{
            "manufacturerName": "Legacy Mfr",
            "styleName": "Unknown",
            "items": [],
            "customItems": [],
            "summary": {
                "cabinets": 160,
                "assemblyFee": 8,
                "modificationsCost": 12,
                "deliveryFee": 0,
                "taxRate": 0
            }
        }]);

        let snapshot = snapshot_from_value(&blob, Decimal::ONE).expect("snapshot");
        assert_eq!(snapshot.styles[0].cabinets, dec("160.00"));
        assert_eq!(snapshot.styles[0].style_total, dec("180.00"));
    }

    #[test]
    fn percent_discount_takes_precedence_over_absolute_amount() {
        let blob = json!([{
            "manufacturerName": "Artisan Casework",
            "styleName": "Shaker Moss",
            "items": [{"name": "B12", "price": 100, "quantity": 2}],
            "summary": {"discountPercent": 10, "discountAmount": 999, "taxRate": 0, "deliveryFee": 0}
        }]);

        let snapshot = snapshot_from_value(&blob, Decimal::ONE).expect("snapshot");
        assert_eq!(snapshot.styles[0].discount_amount, dec("20.00"));
        assert_eq!(snapshot.styles[0].total, dec("180.00"));
    }

    #[test]
    fn contractor_multiplier_scales_unit_prices() {
        let blob = json!([{
            "manufacturerName": "Artisan Casework",
            "styleName": "Shaker Moss",
            "items": [{"name": "B12", "price": 100, "quantity": 1}],
            "summary": {"taxRate": 0, "deliveryFee": 0}
        }]);

        let snapshot = snapshot_from_value(&blob, dec("1.25")).expect("snapshot");
        assert_eq!(snapshot.styles[0].cabinets, dec("125.00"));
    }

    #[test]
    fn decode_accepts_a_bare_block_object() {
        let blob = json!({
            "manufacturerName": "Artisan Casework",
            "styleName": "Shaker Moss",
            "items": []
        });
        let blocks = decode_manufacturers_data(&blob).expect("single block");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].manufacturer_name, "Artisan Casework");
    }
}
