//! Billing integration tests.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use clinic_core::billing::{compute_invoice_totals, round_money, validate_invoice, CatalogLookup};
use clinic_core::db::Database;
use clinic_core::service::{ClinicError, ClinicService};
use clinic_core::store::{CatalogStore, ClinicStore, InvoiceStore, MemoryStore};
use clinic_core::{
    InvoiceForm, InvoiceLineItem, InvoiceStatus, ItemKind, Patient, Product, Soin, SoinCategory,
    StockMovement,
};

fn line(kind: ItemKind, price: Decimal, quantity: i64) -> InvoiceLineItem {
    InvoiceLineItem {
        item_id: Some(1),
        kind,
        name: "Article".to_string(),
        quantity,
        unit_price: price,
    }
}

fn make_form(items: Vec<InvoiceLineItem>) -> InvoiceForm {
    InvoiceForm {
        patient_cin: "AB123456".to_string(),
        issue_date: NaiveDate::from_ymd_opt(2024, 6, 10),
        created_by: "reception".to_string(),
        status: None,
        notes: None,
        items,
    }
}

fn seed<S: ClinicStore + ?Sized>(store: &S) -> (i64, i64) {
    store
        .insert_patient(&Patient::new(
            "AB123456".to_string(),
            "Nadia".to_string(),
            "Alaoui".to_string(),
        ))
        .unwrap();

    let mut cream = Product::new("Crème réparatrice".to_string(), Decimal::new(10000, 2));
    cream.stock = 10;
    let product_id = store.upsert_product(&cream).unwrap();
    let soin_id = store
        .upsert_soin(&Soin::new(
            "Séance de drainage".to_string(),
            Decimal::new(4999, 2),
            SoinCategory::Therapie,
        ))
        .unwrap();
    (product_id, soin_id)
}

#[test]
fn test_worked_example_totals() {
    let totals = compute_invoice_totals(&[
        line(ItemKind::Product, Decimal::new(10000, 2), 2),
        line(ItemKind::Service, Decimal::new(4999, 2), 1),
    ])
    .unwrap();

    assert_eq!(totals.pretax_total, Decimal::new(24999, 2));
    assert_eq!(totals.tax_amount, Decimal::new(5000, 2));
    assert_eq!(totals.tax_rate, Decimal::from(20));
    assert_eq!(totals.grand_total, Decimal::new(29999, 2));
}

#[test]
fn test_empty_invoice_totals_but_invalid() {
    let totals = compute_invoice_totals(&[]).unwrap();
    assert_eq!(totals.pretax_total, Decimal::ZERO);
    assert_eq!(totals.tax_amount, Decimal::ZERO);
    assert_eq!(totals.grand_total, Decimal::ZERO);

    let errors = validate_invoice(&make_form(vec![]));
    assert_eq!(errors, vec!["Au moins un article est requis".to_string()]);
}

#[test]
fn test_service_quantity_not_pinned_by_validator() {
    let errors = validate_invoice(&make_form(vec![line(
        ItemKind::Service,
        Decimal::new(300, 0),
        3,
    )]));
    assert!(errors.is_empty());
}

fn run_invoice_lifecycle<S: ClinicStore + ?Sized>(store: &S) {
    let (product_id, soin_id) = seed(store);
    let service = ClinicService::new(store);
    let catalog = service.catalog();

    let mut product_line = InvoiceLineItem::blank(ItemKind::Product);
    assert!(catalog
        .select_item(&mut product_line, ItemKind::Product, product_id)
        .unwrap());
    product_line.quantity = 2;

    let mut soin_line = InvoiceLineItem::blank(ItemKind::Service);
    assert!(catalog
        .select_item(&mut soin_line, ItemKind::Service, soin_id)
        .unwrap());
    assert_eq!(soin_line.quantity, 1);

    let invoice = service
        .create_invoice(&make_form(vec![product_line, soin_line]))
        .unwrap();
    assert_eq!(invoice.totals().unwrap().grand_total, Decimal::new(29999, 2));
    assert_eq!(store.count_line_items(invoice.id).unwrap(), 2);

    // Invoicing never touches stock
    assert_eq!(store.get_product(product_id).unwrap().unwrap().stock, 10);

    // Catalog price changes do not reach existing lines
    let mut cream = store.get_product(product_id).unwrap().unwrap();
    cream.unit_price = Decimal::new(15000, 2);
    store.upsert_product(&cream).unwrap();
    let stored = service.get_invoice(invoice.id).unwrap();
    assert_eq!(stored.items[0].unit_price, Decimal::new(10000, 2));

    service
        .set_invoice_status(invoice.id, InvoiceStatus::Paid)
        .unwrap();
    service
        .set_invoice_status(invoice.id, InvoiceStatus::Sent)
        .unwrap();

    service.delete_invoice(invoice.id).unwrap();
    assert!(store.get_invoice(invoice.id).unwrap().is_none());
    assert_eq!(store.count_line_items(invoice.id).unwrap(), 0);
}

#[test]
fn test_invoice_lifecycle_sqlite() {
    let db = Database::open_in_memory().unwrap();
    run_invoice_lifecycle(&db);
}

#[test]
fn test_invoice_lifecycle_memory() {
    let store = MemoryStore::new();
    run_invoice_lifecycle(&store);
}

#[test]
fn test_update_replaces_line_items() {
    let db = Database::open_in_memory().unwrap();
    seed(&db);
    let service = ClinicService::new(&db);

    let invoice = service
        .create_invoice(&make_form(vec![
            line(ItemKind::Product, Decimal::new(10, 0), 1),
            line(ItemKind::Product, Decimal::new(20, 0), 1),
            line(ItemKind::Product, Decimal::new(30, 0), 1),
        ]))
        .unwrap();

    let edit = make_form(vec![line(ItemKind::Service, Decimal::new(50, 0), 1)]);
    service.update_invoice(invoice.id, &edit).unwrap();

    let stored = service.get_invoice(invoice.id).unwrap();
    assert_eq!(stored.items.len(), 1);
    assert_eq!(db.count_line_items(invoice.id).unwrap(), 1);
    assert_eq!(stored.totals().unwrap().grand_total, Decimal::new(60, 0));
}

#[test]
fn test_validation_blocks_persistence() {
    let db = Database::open_in_memory().unwrap();
    seed(&db);
    let service = ClinicService::new(&db);

    let form = make_form(vec![line(ItemKind::Product, Decimal::ZERO, 0)]);
    match service.create_invoice(&form) {
        Err(ClinicError::Validation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().all(|e| e.starts_with("Article 1 :")));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(db.list_invoices().unwrap().is_empty());
}

#[test]
fn test_unknown_catalog_item_leaves_line() {
    let store = MemoryStore::new();
    seed(&store);
    let lookup = CatalogLookup::new(&store);

    let mut line = InvoiceLineItem::blank(ItemKind::Product);
    let before = line.clone();
    assert!(!lookup.select_item(&mut line, ItemKind::Product, 404).unwrap());
    assert_eq!(line, before);
}

#[test]
fn test_stock_movements_never_negative() {
    let db = Database::open_in_memory().unwrap();
    let (product_id, _) = seed(&db);
    let service = ClinicService::new(&db);

    assert_eq!(
        service
            .record_stock_movement(&StockMovement::new(product_id, -4, Some("vente".into())))
            .unwrap(),
        6
    );
    assert!(service
        .record_stock_movement(&StockMovement::new(product_id, -7, None))
        .is_err());
    assert_eq!(db.get_product(product_id).unwrap().unwrap().stock, 6);
    assert_eq!(db.list_stock_movements(product_id).unwrap().len(), 1);
}

#[test]
fn test_invoices_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");

    let id = {
        let db = Database::open(&path).unwrap();
        seed(&db);
        ClinicService::new(&db)
            .create_invoice(&make_form(vec![line(
                ItemKind::Product,
                Decimal::new(1999, 2),
                3,
            )]))
            .unwrap()
            .id
    };

    let db = Database::open(&path).unwrap();
    let invoice = db.get_invoice(id).unwrap().unwrap();
    assert_eq!(invoice.items[0].unit_price, Decimal::new(1999, 2));
    assert_eq!(invoice.totals().unwrap().pretax_total, Decimal::new(5997, 2));
}

fn line_strategy() -> impl Strategy<Value = InvoiceLineItem> {
    (
        0i64..1_000_000,
        1i64..100,
        prop_oneof![Just(ItemKind::Product), Just(ItemKind::Service)],
    )
        .prop_map(|(cents, quantity, kind)| line(kind, Decimal::new(cents, 2), quantity))
}

proptest! {
    #[test]
    fn prop_pretax_is_exact_sum(items in prop::collection::vec(line_strategy(), 0..20)) {
        let expected: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        prop_assert_eq!(compute_invoice_totals(&items).unwrap().pretax_total, expected);
    }

    #[test]
    fn prop_two_step_rounding(items in prop::collection::vec(line_strategy(), 0..20)) {
        let totals = compute_invoice_totals(&items).unwrap();
        prop_assert_eq!(
            totals.tax_amount,
            round_money(totals.pretax_total * Decimal::new(20, 2))
        );
        prop_assert_eq!(
            totals.grand_total,
            round_money(totals.pretax_total + totals.tax_amount)
        );
    }

    #[test]
    fn prop_item_errors_in_ascending_order(count in 1usize..12) {
        let items = vec![InvoiceLineItem::blank(ItemKind::Product); count];
        let errors = validate_invoice(&make_form(items));

        let indices: Vec<usize> = errors
            .iter()
            .filter_map(|e| e.strip_prefix("Article "))
            .filter_map(|rest| rest.split(' ').next())
            .filter_map(|n| n.parse().ok())
            .collect();

        prop_assert!(!indices.is_empty());
        prop_assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(indices.last().copied(), Some(count));
    }
}
