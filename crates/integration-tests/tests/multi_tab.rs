//! Several tabs sharing one storage profile.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use cartwright_core::{Cart, CartLine, ProductId};
use cartwright_engine::notifier::ChangeSource;
use cartwright_engine::storage::Profile;
use cartwright_engine::views::{CartView, OUT_OF_STOCK_LABEL};
use cartwright_engine::{CartError, EngineConfig, Tab};
use cartwright_integration_tests::product;
use rust_decimal::Decimal;
use tokio::sync::Barrier;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn line(id: &str, quantity: u32) -> CartLine {
    CartLine::new(ProductId::from(id), format!("Product {id}"), Decimal::TEN, quantity)
}

#[tokio::test]
async fn test_concurrent_read_modify_write_keeps_one_outcome() {
    let profile = Profile::in_memory(64);
    let config = EngineConfig::default();
    let tab_a = Tab::open(&profile, &config);
    let tab_b = Tab::open(&profile, &config);
    tab_a
        .store()
        .save(&Cart::from_lines(vec![line("p1", 1)]).unwrap())
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));

    let adder = {
        let barrier = Arc::clone(&barrier);
        let store = tab_a.store().clone();
        tokio::spawn(async move {
            let mut cart = store.load();
            barrier.wait().await;
            cart.put_line(line("p2", 1));
            store.save(&cart).unwrap();
        })
    };
    let remover = {
        let barrier = Arc::clone(&barrier);
        let store = tab_b.store().clone();
        tokio::spawn(async move {
            let mut cart = store.load();
            barrier.wait().await;
            cart.remove(&ProductId::from("p1"));
            store.save(&cart).unwrap();
        })
    };
    adder.await.unwrap();
    remover.await.unwrap();

    let added = Cart::from_lines(vec![line("p1", 1), line("p2", 1)]).unwrap();
    let removed = Cart::new();
    let final_cart = Tab::open(&profile, &config).store().load();
    assert!(
        final_cart == added || final_cart == removed,
        "unexpected merged cart: {final_cart:?}"
    );
    assert_eq!(
        tab_a.store().item_count(),
        final_cart.item_count(),
        "count mirror must match the surviving cart"
    );
}

#[tokio::test]
async fn test_badge_follows_other_tab() {
    let profile = Profile::in_memory(64);
    let config = EngineConfig::default();
    let tab_a = Tab::open(&profile, &config);
    let tab_b = Tab::open(&profile, &config);
    let mut badge = tab_b.badge();
    assert_eq!(badge.count(), 0);

    tab_a.mutator().add_to_cart(&product("p1", 5), 3).unwrap();

    let source = timeout(WAIT, badge.next_change()).await.unwrap();
    assert_eq!(source, Some(ChangeSource::OtherTab));
    assert_eq!(badge.count(), 3);
}

#[tokio::test]
async fn test_grid_availability_follows_other_tab() {
    let profile = Profile::in_memory(64);
    let config = EngineConfig::default();
    let tab_a = Tab::open(&profile, &config);
    let tab_b = Tab::open(&profile, &config);
    let p1 = product("p1", 4);
    let mut grid = tab_b.product_grid(vec![p1.clone()]);
    assert_eq!(grid.available(&p1), 4);

    tab_a.mutator().add_to_cart(&p1, 4).unwrap();
    timeout(WAIT, grid.next_change()).await.unwrap();

    let controls = grid.controls(&p1);
    assert_eq!(controls.available, 0);
    assert!(!controls.can_add);
    assert_eq!(controls.stock_label, Some(OUT_OF_STOCK_LABEL));

    assert_eq!(grid.set_desired_quantity(&p1, "2"), 0);
    let err = grid.add(&p1).unwrap_err();
    assert!(matches!(err, CartError::InvalidQuantity));
    assert_eq!(tab_a.store().load().quantity_of(&ProductId::from("p1")), 4);
}

#[tokio::test]
async fn test_own_writes_wake_as_this_tab() {
    let profile = Profile::in_memory(64);
    let tab = Tab::open(&profile, &EngineConfig::default());
    let mut page = tab.cart_page();

    tab.mutator().add_to_cart(&product("p1", 5), 1).unwrap();

    let source = timeout(WAIT, page.next_change()).await.unwrap();
    assert_eq!(source, Some(ChangeSource::ThisTab));
    assert_eq!(page.item_count(), 1);
}

#[tokio::test]
async fn test_every_tab_converges_after_clear() {
    let profile = Profile::in_memory(64);
    let config = EngineConfig::default();
    let tabs: Vec<Tab> = (0..3).map(|_| Tab::open(&profile, &config)).collect();
    let writer = tabs.first().unwrap();
    writer.mutator().add_to_cart(&product("p1", 5), 2).unwrap();
    let mut pages: Vec<_> = tabs.iter().skip(1).map(Tab::cart_page).collect();

    writer.mutator().clear().unwrap();

    for page in &mut pages {
        timeout(WAIT, page.next_change()).await.unwrap();
        assert!(page.is_empty());
    }
}

#[tokio::test]
async fn test_unrelated_slots_do_not_wake_views() {
    let profile = Profile::in_memory(64);
    let config = EngineConfig::default();
    let tab_a = Tab::open(&profile, &config);
    let tab_b = Tab::open(&profile, &config);
    let mut badge = tab_b.badge();

    tab_a.storage().set("theme", "dark").unwrap();
    tab_a.storage().set("token", "abc").unwrap();

    assert!(!badge.sync());
    assert_eq!(badge.count(), 0);
}
