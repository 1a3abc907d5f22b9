//! End-to-end service tests against a live PostgreSQL instance.
//!
//! Run with `DATABASE_URL` pointing at a scratch database:
//! `cargo test -- --ignored`

mod common;

use floreria_backend::catalog::CatalogService;
use floreria_backend::error::AppError;
use floreria_backend::fulfillment::FulfillmentService;
use floreria_backend::models::{CartItem, PlaceOrderRequest};
use floreria_backend::orders::OrderService;
use floreria_backend::unit_of_work::PostgresUnitOfWork;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

use common::{
    cleanup_database, count, seed_delivered, seed_product, seed_user, setup_database,
    unreachable_mailer,
};

fn order_service(pool: &PgPool) -> OrderService {
    OrderService::new(PostgresUnitOfWork::new(pool.clone()), unreachable_mailer())
}

fn fulfillment_service(pool: &PgPool, export_dir: &tempfile::TempDir) -> FulfillmentService {
    FulfillmentService::new(
        pool.clone(),
        unreachable_mailer(),
        export_dir.path().to_path_buf(),
    )
}

fn rose_cart(producto_id: i32) -> Vec<CartItem> {
    vec![CartItem {
        product_id: producto_id,
        name: "Rose Bouquet".to_string(),
        price: dec!(20.00),
        quantity: 2,
    }]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn placement_commits_order_line_items_and_total() {
    let pool = setup_database().await;
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    let orden_id = order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: rose_cart(producto_id),
            referral_code: None,
        })
        .await
        .expect("Failed to place order");

    let (total,): (Decimal,) = sqlx::query_as("SELECT total FROM ordenes WHERE id = $1")
        .bind(orden_id)
        .fetch_one(&pool)
        .await
        .expect("Order row missing");
    assert_eq!(total, dec!(40.00));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_productos").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_detalle").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM referidos").await, 0);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn referral_code_creates_two_percent_commissions() {
    let pool = setup_database().await;
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let afiliado_id = seed_user(&pool, "Beto", "Campos", "beto@example.com", Some("FLOR7")).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: rose_cart(producto_id),
            referral_code: Some("FLOR7".to_string()),
        })
        .await
        .expect("Failed to place order");

    let (afiliado, monto): (i32, Decimal) =
        sqlx::query_as("SELECT afiliado_id, monto FROM referidos")
            .fetch_one(&pool)
            .await
            .expect("Commission row missing");
    assert_eq!(afiliado, afiliado_id);
    // 2% of 40.00
    assert_eq!(monto, dec!(0.80));

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn unknown_referral_code_is_silently_ignored() {
    let pool = setup_database().await;
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: rose_cart(producto_id),
            referral_code: Some("NO-SUCH-CODE".to_string()),
        })
        .await
        .expect("Order should still be placed");

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM referidos").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM ordenes").await, 1);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn placement_is_all_or_nothing() {
    let pool = setup_database().await;
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    // Second cart line violates the producto_id foreign key, so the whole
    // placement must roll back.
    let result = order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: vec![
                CartItem {
                    product_id: producto_id,
                    name: "Rose Bouquet".to_string(),
                    price: dec!(20.00),
                    quantity: 2,
                },
                CartItem {
                    product_id: 999_999,
                    name: "Fantasma".to_string(),
                    price: dec!(5.00),
                    quantity: 1,
                },
            ],
            referral_code: None,
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM ordenes").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_productos").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_detalle").await, 0);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn empty_cart_is_rejected_before_any_write() {
    let pool = setup_database().await;
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;

    let result = order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: vec![],
            referral_code: None,
        })
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM ordenes").await, 0);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn delivery_archives_atomically_and_reports_mail_failure() {
    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    let orden_id = order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: rose_cart(producto_id),
            referral_code: None,
        })
        .await
        .expect("Failed to place order");

    // SMTP is unreachable: archival must stand, mail failure must surface
    // as the partial-success error.
    let result = fulfillment_service(&pool, &export_dir)
        .mark_delivered(orden_id)
        .await;
    assert!(matches!(
        result,
        Err(AppError::DeliveredMailFailed { orden_id: id }) if id == orden_id
    ));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM ordenes").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_detalle").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orden_productos").await, 0);

    let (cliente, productos): (String, serde_json::Value) =
        sqlx::query_as("SELECT cliente, productos FROM pedidos_entregados WHERE orden_id = $1")
            .bind(orden_id)
            .fetch_one(&pool)
            .await
            .expect("Archive row missing");
    assert_eq!(cliente, "Ana Flores");
    let items = productos.as_array().expect("Snapshot should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["producto"], "Rose Bouquet");
    assert_eq!(items[0]["cantidad"], 2);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn delivering_missing_order_is_not_found_and_writes_nothing() {
    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");

    let result = fulfillment_service(&pool, &export_dir)
        .mark_delivered(424_242)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM pedidos_entregados").await,
        0
    );

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn catalog_filters_union_within_field_intersect_across() {
    let pool = setup_database().await;
    seed_product(&pool, "Rosa", dec!(10.00), "verano", "nacional", "México").await;
    seed_product(&pool, "Tulipán", dec!(12.00), "primavera", "importado", "Holanda").await;
    seed_product(&pool, "Girasol", dec!(8.00), "verano", "importado", "Perú").await;

    let catalog = CatalogService::new(pool.clone());

    // OR within temporada_flor.
    let by_season = catalog
        .list(&["verano".into(), "primavera".into()], &[])
        .await
        .expect("Failed to filter");
    assert_eq!(by_season.len(), 3);

    // AND across fields.
    let crossed = catalog
        .list(&["verano".into()], &["importado".into()])
        .await
        .expect("Failed to filter");
    assert_eq!(crossed.len(), 1);
    assert_eq!(crossed[0].name, "Girasol");

    // No filters: everything.
    let all = catalog.list(&[], &[]).await.expect("Failed to list");
    assert_eq!(all.len(), 3);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn search_is_case_insensitive_and_rejects_empty_query() {
    let pool = setup_database().await;
    seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;
    seed_product(&pool, "Tulipán", dec!(12.00), "primavera", "importado", "Holanda").await;

    let catalog = CatalogService::new(pool.clone());

    assert!(matches!(
        catalog.search("").await,
        Err(AppError::BadRequest(_))
    ));

    let hits = catalog.search("rose").await.expect("Failed to search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Rose Bouquet");

    // Matches country too.
    let hits = catalog.search("holanda").await.expect("Failed to search");
    assert_eq!(hits.len(), 1);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn deleting_missing_product_is_not_found() {
    let pool = setup_database().await;
    seed_product(&pool, "Rosa", dec!(10.00), "verano", "nacional", "México").await;

    let catalog = CatalogService::new(pool.clone());
    assert!(matches!(
        catalog.delete(999_999).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM productos").await, 1);

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn export_writes_summary_pdf_to_durable_storage() {
    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");
    let usuario_id = seed_user(&pool, "Ana", "Flores", "ana@example.com", None).await;
    let producto_id = seed_product(&pool, "Rose Bouquet", dec!(20.00), "verano", "nacional", "México").await;

    let fulfillment = fulfillment_service(&pool, &export_dir);
    let orden_id = order_service(&pool)
        .place(PlaceOrderRequest {
            usuario_id: Some(usuario_id),
            carrito: rose_cart(producto_id),
            referral_code: None,
        })
        .await
        .expect("Failed to place order");
    // Mail fails but the order is archived.
    let _ = fulfillment.mark_delivered(orden_id).await;

    let outcome = fulfillment
        .export_range(None, None, None)
        .await
        .expect("Failed to export");
    assert!(!outcome.mailed);

    let bytes = std::fs::read(export_dir.path().join(&outcome.file))
        .expect("Export file missing");
    assert!(bytes.starts_with(b"%PDF"));

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn single_receipt_streams_pdf_from_archived_snapshot() {
    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");
    seed_delivered(&pool, 31, "Ana Flores", chrono::Utc::now(), dec!(40.00)).await;

    let fulfillment = fulfillment_service(&pool, &export_dir);
    let (filename, pdf) = fulfillment
        .single_receipt(31)
        .await
        .expect("Failed to render archived receipt");
    assert_eq!(filename, "Comprobante-31.pdf");
    assert!(pdf.starts_with(b"%PDF"));

    assert!(matches!(
        fulfillment.single_receipt(999_999).await,
        Err(AppError::NotFound(_))
    ));

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn export_range_covers_whole_calendar_days() {
    use chrono::{NaiveDate, TimeZone, Utc};

    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");
    // Delivered midday on the range's end day; a midnight upper bound would
    // miss it.
    let on_end_day = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let after_range = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
    seed_delivered(&pool, 41, "Ana Flores", on_end_day, dec!(40.00)).await;
    seed_delivered(&pool, 42, "Beto Campos", after_range, dec!(12.00)).await;

    let fulfillment = fulfillment_service(&pool, &export_dir);
    let desde = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let hasta = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    let outcome = fulfillment
        .export_range(Some(desde), Some(hasta), None)
        .await
        .expect("Order on the end day should be inside the range");
    assert!(export_dir.path().join(&outcome.file).exists());

    // Neither order falls in May.
    let result = fulfillment
        .export_range(
            Some(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()),
            None,
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    cleanup_database(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
#[serial_test::serial]
#[ignore = "requires a running PostgreSQL (set DATABASE_URL)"]
async fn export_of_empty_archive_is_not_found() {
    let pool = setup_database().await;
    let export_dir = tempfile::tempdir().expect("Failed to create export dir");

    let result = fulfillment_service(&pool, &export_dir)
        .export_range(None, None, None)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    cleanup_database(&pool).await;
}
