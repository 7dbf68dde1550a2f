//! End-to-end tests for the basket controller: catalog-backed product
//! mutations, coupon application, address handling, service selection and
//! write-through persistence.

mod common;

use std::collections::{BTreeMap, HashMap};

use assert_matches::assert_matches;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use storefront_basket::catalog::{CouponCodeRecord, CouponConfig, ProductRecord, VariantRecord};
use storefront_basket::entities::address::{AddressInput, AddressType};
use storefront_basket::entities::attribute::OrderAttributeKind;
use storefront_basket::entities::order_service::ServiceType;
use storefront_basket::entities::price::Price;
use storefront_basket::errors::BasketError;
use storefront_basket::events::Event;
use storefront_basket::services::{AddProductInput, AddProductOptions, BasketService};

use common::{attribute_record, selection_product, tier, BrokenSessionStore, TestApp};

fn raw_address(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn added_products_take_consecutive_positions() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));
    app.seed_product("p2", "P2", dec!(5.00));

    let mut basket = app.basket("s1").await;
    let first = basket
        .add_product(AddProductInput::new("p1").with_quantity(2))
        .await
        .unwrap();
    let second = basket.add_product(AddProductInput::new("p2")).await.unwrap();

    assert_eq!((first, second), (0, 1));
    assert_eq!(basket.get().products.len(), 2);
    assert_eq!(basket.get().product(0).unwrap().quantity, 2);
    assert_eq!(basket.get().totals.subtotal, dec!(25.00));
    assert_eq!(basket.get().totals.total, dec!(25.00));
}

#[tokio::test]
async fn unknown_product_is_rejected_without_mutation() {
    let app = TestApp::new();
    let mut basket = app.basket("s1").await;

    let err = basket
        .add_product(AddProductInput::new("missing"))
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::ProductUnavailable(_));
    assert!(basket.get().products.is_empty());
}

#[rstest]
#[case(1, dec!(10.00))]
#[case(4, dec!(10.00))]
#[case(5, dec!(8.50))]
#[case(25, dec!(7.00))]
#[tokio::test]
async fn add_resolves_tiered_price_for_quantity(#[case] quantity: u32, #[case] unit: Decimal) {
    let app = TestApp::new();
    app.seed_tiered_product(
        "p1",
        "P1",
        &[(1, dec!(10.00)), (5, dec!(8.50)), (20, dec!(7.00))],
    );

    let mut basket = app.basket("s1").await;
    basket
        .add_product(AddProductInput::new("p1").with_quantity(quantity))
        .await
        .unwrap();

    let line = basket.get().product(0).unwrap();
    assert_eq!(line.price.value, unit);
    assert_eq!(
        basket.get().totals.subtotal,
        unit * Decimal::from(quantity)
    );
}

#[tokio::test]
async fn catalog_rebate_is_zeroed_on_add() {
    let app = TestApp::new();
    let mut discounted = tier(1, dec!(10.00));
    discounted.price.rebate = dec!(2.00);
    app.products.insert(ProductRecord {
        id: "p1".into(),
        code: "P1".into(),
        name: "P1".into(),
        kind: Default::default(),
        price_tiers: vec![discounted],
        attributes: Vec::new(),
        variants: Vec::new(),
    });

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();

    assert_eq!(basket.get().product(0).unwrap().price.rebate, Decimal::ZERO);
}

#[tokio::test]
async fn delete_reindexes_remaining_positions() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(1.00));
    app.seed_product("p2", "P2", dec!(2.00));
    app.seed_product("p3", "P3", dec!(3.00));

    let mut basket = app.basket("s1").await;
    for id in ["p1", "p2", "p3"] {
        basket.add_product(AddProductInput::new(id)).await.unwrap();
    }

    basket.delete_product(1).await.unwrap();

    assert_eq!(basket.get().products.len(), 2);
    assert_eq!(basket.get().product(0).unwrap().product_code, "P1");
    assert_eq!(basket.get().product(1).unwrap().product_code, "P3");

    let err = basket.delete_product(7).await.unwrap_err();
    assert_matches!(err, BasketError::PositionNotFound(7));
}

#[tokio::test]
async fn coupon_lines_cannot_be_deleted_or_edited() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(50.00));
    app.seed_coupon(
        "SAVE5",
        "fixed-rebate",
        CouponConfig {
            discount: dec!(5.00),
            ..Default::default()
        },
    );

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket.add_coupon("SAVE5").await.unwrap();

    let before = basket.get().clone();
    assert!(basket.get().product(1).unwrap().immutable);

    let err = basket.delete_product(1).await.unwrap_err();
    assert_matches!(err, BasketError::ImmutableLine(1));

    let err = basket
        .edit_product(1, 3, AddProductOptions::default(), &[])
        .await
        .unwrap_err();
    assert_matches!(err, BasketError::ImmutableLine(1));

    assert_eq!(basket.get().products, before.products);
    assert_eq!(basket.get().totals, before.totals);
}

#[tokio::test]
async fn edit_requantifies_and_reprices_in_place() {
    let app = TestApp::new();
    app.seed_tiered_product("p1", "P1", &[(1, dec!(10.00)), (5, dec!(8.50))]);

    let mut basket = app.basket("s1").await;
    basket
        .add_product(AddProductInput::new("p1").with_quantity(2))
        .await
        .unwrap();

    basket
        .edit_product(0, 5, AddProductOptions::default(), &[])
        .await
        .unwrap();

    assert_eq!(basket.get().products.len(), 1);
    let line = basket.get().product(0).unwrap();
    assert_eq!(line.quantity, 5);
    assert_eq!(line.price.value, dec!(8.50));
    assert_eq!(basket.get().totals.subtotal, dec!(42.50));
}

#[tokio::test]
async fn edit_removes_listed_attribute_codes_and_keeps_neighbors() {
    let app = TestApp::new();
    app.products.insert(ProductRecord {
        id: "p1".into(),
        code: "P1".into(),
        name: "P1".into(),
        kind: Default::default(),
        price_tiers: vec![tier(1, dec!(10.00))],
        attributes: vec![
            attribute_record("a1", "color", "blue"),
            attribute_record("a2", "giftwrap", "yes"),
        ],
        variants: Vec::new(),
    });
    app.seed_product("p2", "P2", dec!(3.00));

    let mut basket = app.basket("s1").await;
    let mut input = AddProductInput::new("p1");
    input.config_attribute_ids = vec!["a1".to_string(), "a2".to_string()];
    basket.add_product(input).await.unwrap();
    basket.add_product(AddProductInput::new("p2")).await.unwrap();

    basket
        .edit_product(0, 1, AddProductOptions::default(), &["giftwrap".to_string()])
        .await
        .unwrap();

    let edited = basket.get().product(0).unwrap();
    assert!(edited.attribute("color").is_some());
    assert!(edited.attribute("giftwrap").is_none());
    assert_eq!(basket.get().product(1).unwrap().product_code, "P2");
}

#[tokio::test]
async fn edit_of_last_position_round_trips() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(1.00));
    app.seed_product("p2", "P2", dec!(2.00));

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket.add_product(AddProductInput::new("p2")).await.unwrap();

    basket
        .edit_product(1, 4, AddProductOptions::default(), &[])
        .await
        .unwrap();

    assert_eq!(basket.get().products.len(), 2);
    assert_eq!(basket.get().product(0).unwrap().product_code, "P1");
    assert_eq!(basket.get().product(1).unwrap().product_code, "P2");
    assert_eq!(basket.get().product(1).unwrap().quantity, 4);
}

#[tokio::test]
async fn selection_resolves_to_unique_variant() {
    let app = TestApp::new();
    app.seed_product("sub-blue", "SHIRT-BLUE", dec!(25.00));
    app.seed_product("sub-red", "SHIRT-RED", dec!(27.00));
    app.products.insert(selection_product(
        "sel",
        "SHIRT",
        vec![
            attribute_record("blue", "color", "blue"),
            attribute_record("red", "color", "red"),
        ],
        vec![
            VariantRecord {
                product_id: "sub-blue".into(),
                attribute_ids: vec!["blue".into()],
            },
            VariantRecord {
                product_id: "sub-red".into(),
                attribute_ids: vec!["red".into()],
            },
        ],
        vec![tier(1, dec!(20.00))],
    ));

    let mut basket = app.basket("s1").await;
    let mut input = AddProductInput::new("sel");
    input.variant_attribute_ids = vec!["blue".to_string()];
    basket.add_product(input).await.unwrap();

    let line = basket.get().product(0).unwrap();
    assert_eq!(line.product_code, "SHIRT-BLUE");
    assert_eq!(line.price.value, dec!(25.00));
    let variant = line.attribute("color").unwrap();
    assert_eq!(variant.kind, OrderAttributeKind::Variant);
    assert_eq!(variant.value, "blue");
}

#[tokio::test]
async fn edit_reprices_variant_through_selection_tiers() {
    let app = TestApp::new();
    // the article has no price list of its own, the selection prices it
    app.products.insert(ProductRecord {
        id: "sub-blue".into(),
        code: "SHIRT-BLUE".into(),
        name: "SHIRT-BLUE".into(),
        kind: Default::default(),
        price_tiers: Vec::new(),
        attributes: Vec::new(),
        variants: Vec::new(),
    });
    app.products.insert(selection_product(
        "sel",
        "SHIRT",
        vec![attribute_record("blue", "color", "blue")],
        vec![VariantRecord {
            product_id: "sub-blue".into(),
            attribute_ids: vec!["blue".into()],
        }],
        vec![tier(1, dec!(20.00))],
    ));

    let mut basket = app.basket("s1").await;
    let mut input = AddProductInput::new("sel");
    input.variant_attribute_ids = vec!["blue".to_string()];
    basket.add_product(input).await.unwrap();
    assert_eq!(basket.get().product(0).unwrap().price.value, dec!(20.00));

    basket
        .edit_product(0, 2, AddProductOptions::default(), &[])
        .await
        .unwrap();

    let line = basket.get().product(0).unwrap();
    assert_eq!(line.product_code, "SHIRT-BLUE");
    assert_eq!(line.quantity, 2);
    assert_eq!(line.price.value, dec!(20.00));
    assert_eq!(basket.get().totals.subtotal, dec!(40.00));
}

#[tokio::test]
async fn zero_quantity_is_rejected_up_front() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut basket = app.basket("s1").await;
    let err = basket
        .add_product(AddProductInput::new("p1").with_quantity(0))
        .await
        .unwrap_err();
    assert_matches!(err, BasketError::InvalidQuantity);
    assert!(basket.get().products.is_empty());

    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    let err = basket
        .edit_product(0, 0, AddProductOptions::default(), &[])
        .await
        .unwrap_err();
    assert_matches!(err, BasketError::InvalidQuantity);
    assert_eq!(basket.get().product(0).unwrap().quantity, 1);
}

#[tokio::test]
async fn unresolved_selection_fails_unless_variant_option_disabled() {
    let app = TestApp::new();
    app.products.insert(selection_product(
        "sel",
        "SHIRT",
        Vec::new(),
        Vec::new(),
        vec![tier(1, dec!(20.00))],
    ));

    let mut basket = app.basket("s1").await;

    let mut input = AddProductInput::new("sel");
    input.variant_attribute_ids = vec!["nope".to_string()];
    let err = basket.add_product(input).await.unwrap_err();
    assert_matches!(err, BasketError::ProductUnavailable(_));
    assert!(basket.get().products.is_empty());

    let mut input = AddProductInput::new("sel");
    input.options = AddProductOptions {
        variant: false,
        stock: true,
    };
    basket.add_product(input).await.unwrap();
    assert_eq!(basket.get().product(0).unwrap().product_code, "SHIRT");
}

#[tokio::test]
async fn unknown_coupon_code_is_invalid_without_mutation() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    let before = basket.get().clone();

    let err = basket.add_coupon("NOPE").await.unwrap_err();
    assert_matches!(err, BasketError::InvalidCoupon(_));
    assert_eq!(basket.get(), &before);
}

#[tokio::test]
async fn expired_coupon_code_is_invalid() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));
    app.coupons.insert_code(CouponCodeRecord {
        code: "OLD".into(),
        coupon_id: "c1".into(),
        valid_from: None,
        valid_until: Some(chrono::Utc::now() - chrono::Duration::days(1)),
        usage_budget: None,
        usage_count: 0,
    });

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();

    let err = basket.add_coupon("OLD").await.unwrap_err();
    assert_matches!(err, BasketError::InvalidCoupon(_));
}

#[tokio::test]
async fn same_coupon_twice_is_a_duplicate() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(50.00));
    app.seed_coupon(
        "TEN",
        "percent-rebate",
        CouponConfig {
            discount: dec!(10),
            ..Default::default()
        },
    );

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket.add_coupon("TEN").await.unwrap();

    let err = basket.add_coupon("TEN").await.unwrap_err();
    assert_matches!(err, BasketError::DuplicateCoupon(_));
}

#[tokio::test]
async fn ineligible_coupon_leaves_basket_unchanged() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));
    app.seed_coupon(
        "BIGSPENDER",
        "fixed-rebate",
        CouponConfig {
            discount: dec!(5.00),
            min_basket_value: Some(dec!(100.00)),
            ..Default::default()
        },
    );

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    let before = basket.get().clone();

    let err = basket.add_coupon("BIGSPENDER").await.unwrap_err();
    assert_matches!(err, BasketError::CouponNotEligible(_));
    assert_eq!(basket.get(), &before);
}

#[tokio::test]
async fn removing_a_coupon_restores_the_totals() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(40.00));
    app.seed_coupon(
        "TEN",
        "percent-rebate",
        CouponConfig {
            discount: dec!(10),
            ..Default::default()
        },
    );

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    let before = basket.get().totals.clone();

    basket.add_coupon("TEN").await.unwrap();
    assert_eq!(basket.get().totals.subtotal, dec!(36.00));
    assert_eq!(basket.get().totals.rebate_total, dec!(4.00));

    basket.delete_coupon("TEN").await.unwrap();
    assert_eq!(basket.get().totals, before);
    assert!(!basket.get().has_coupon("TEN"));
    assert_eq!(basket.get().products.len(), 1);
}

#[tokio::test]
async fn invalid_address_input_reports_fields_and_keeps_slot() {
    let app = TestApp::new();
    let mut basket = app.basket("s1").await;

    let err = basket
        .set_address(
            AddressType::Payment,
            AddressInput::Raw(raw_address(&[("firstname", "Ada"), ("planet", "Mars")])),
        )
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::InvalidAddress { ref fields } => {
        assert!(fields.contains_key("planet"));
        assert!(fields.contains_key("lastname"));
    });
    assert!(basket.get().address(AddressType::Payment).is_none());
}

#[tokio::test]
async fn address_slot_can_be_set_and_removed() {
    let app = TestApp::new();
    let mut basket = app.basket("s1").await;

    basket
        .set_address(
            AddressType::Delivery,
            AddressInput::Raw(raw_address(&[
                ("lastname", "Lovelace"),
                ("address1", "Example Road 1"),
                ("city", "Hamburg"),
            ])),
        )
        .await
        .unwrap();
    assert_eq!(
        basket.get().address(AddressType::Delivery).unwrap().city,
        "Hamburg"
    );

    basket
        .set_address(AddressType::Delivery, AddressInput::Remove)
        .await
        .unwrap();
    assert!(basket.get().address(AddressType::Delivery).is_none());

    // removing an empty slot stays a success and the slot stays empty
    basket
        .set_address(AddressType::Delivery, AddressInput::Remove)
        .await
        .unwrap();
    assert!(basket.get().address(AddressType::Delivery).is_none());
}

#[tokio::test]
async fn service_with_undeclared_attribute_key_is_rejected() {
    let app = TestApp::new();
    app.seed_service(
        "svc1",
        "standard",
        ServiceType::Delivery,
        "delivery-flat",
        Price::new(dec!(4.90), "EUR"),
    );

    let mut basket = app.basket("s1").await;
    let mut attributes = BTreeMap::new();
    attributes.insert("delivery.instructions".to_string(), "ring twice".to_string());
    attributes.insert("delivery.color".to_string(), "purple".to_string());

    let err = basket
        .set_service(ServiceType::Delivery, "svc1", attributes)
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::UnknownServiceAttribute { keys } => {
        assert_eq!(keys, vec!["delivery.color".to_string()]);
    });
    assert!(basket.get().service(ServiceType::Delivery).is_none());
}

#[tokio::test]
async fn service_with_invalid_attribute_value_is_rejected() {
    let app = TestApp::new();
    app.seed_service(
        "pay1",
        "directdebit",
        ServiceType::Payment,
        "payment-directdebit",
        Price::zero("EUR"),
    );

    let mut basket = app.basket("s1").await;
    let mut attributes = BTreeMap::new();
    attributes.insert("payment.account-owner".to_string(), "Ada Lovelace".to_string());
    attributes.insert("payment.iban".to_string(), "not-an-iban".to_string());

    let err = basket
        .set_service(ServiceType::Payment, "pay1", attributes)
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::InvalidServiceAttribute(_));
    assert!(basket.get().service(ServiceType::Payment).is_none());
}

#[tokio::test]
async fn chosen_service_contributes_to_the_total() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));
    app.seed_service(
        "svc1",
        "standard",
        ServiceType::Delivery,
        "delivery-flat",
        Price::new(dec!(4.90), "EUR"),
    );

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket
        .set_service(ServiceType::Delivery, "svc1", BTreeMap::new())
        .await
        .unwrap();

    let chosen = basket.get().service(ServiceType::Delivery).unwrap();
    assert_eq!(chosen.code, "standard");
    assert_eq!(basket.get().totals.service_total, dec!(4.90));
    assert_eq!(basket.get().totals.total, dec!(14.90));
}

#[tokio::test]
async fn service_of_wrong_type_is_unavailable() {
    let app = TestApp::new();
    app.seed_service(
        "svc1",
        "standard",
        ServiceType::Delivery,
        "delivery-flat",
        Price::new(dec!(4.90), "EUR"),
    );

    let mut basket = app.basket("s1").await;
    let err = basket
        .set_service(ServiceType::Payment, "svc1", BTreeMap::new())
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::ServiceUnavailable(_));
}

#[tokio::test]
async fn clear_empties_basket_and_session() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket.clear().await.unwrap();

    assert!(basket.get().products.is_empty());
    assert_eq!(basket.get().totals.total, Decimal::ZERO);

    let reloaded = app.basket("s1").await;
    assert!(reloaded.get().products.is_empty());
}

#[tokio::test]
async fn mutations_are_written_through_to_the_session() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut basket = app.basket("s1").await;
    basket
        .add_product(AddProductInput::new("p1").with_quantity(2))
        .await
        .unwrap();
    assert!(!basket.get().is_modified());

    let reloaded = app.basket("s1").await;
    assert_eq!(reloaded.get().products.len(), 1);
    assert_eq!(reloaded.get().product(0).unwrap().quantity, 2);
    assert_eq!(reloaded.get().totals.subtotal, dec!(20.00));

    let other_session = app.basket("s2").await;
    assert!(other_session.get().products.is_empty());
}

#[tokio::test]
async fn save_skips_clean_baskets() {
    let app = TestApp::new();

    // a store that refuses writes proves save() doesn't touch it when clean
    let mut context = app.context.clone();
    context.session_store = std::sync::Arc::new(BrokenSessionStore);

    let mut basket = BasketService::load(context, "s1").await.unwrap();
    basket.save().await.unwrap();
}

#[tokio::test]
async fn failed_persistence_leaves_basket_unchanged() {
    let app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut context = app.context.clone();
    context.session_store = std::sync::Arc::new(BrokenSessionStore);

    let mut basket = BasketService::load(context, "s1").await.unwrap();
    let err = basket
        .add_product(AddProductInput::new("p1"))
        .await
        .unwrap_err();

    assert_matches!(err, BasketError::SessionStore(_));
    assert!(basket.get().products.is_empty());
    assert_eq!(basket.get().totals.total, Decimal::ZERO);
}

#[tokio::test]
async fn successful_mutations_emit_events() {
    let mut app = TestApp::new();
    app.seed_product("p1", "P1", dec!(10.00));

    let mut basket = app.basket("s1").await;
    basket.add_product(AddProductInput::new("p1")).await.unwrap();
    basket.delete_product(0).await.unwrap();
    basket.clear().await.unwrap();

    assert_matches!(
        app.events.recv().await,
        Some(Event::ProductAdded {
            position: 0,
            quantity: 1,
            ..
        })
    );
    assert_matches!(
        app.events.recv().await,
        Some(Event::ProductRemoved { position: 0, .. })
    );
    assert_matches!(app.events.recv().await, Some(Event::BasketCleared { .. }));
}
