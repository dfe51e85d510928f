//! End-to-end caching behavior through an in-memory repository.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use repocache_core::{
    CompoundKey, Expr, KeyKind, QueryOptions, RepoCacheError, RepoCacheResult, Specification,
    StrategyConfig,
};
use repocache_storage::{
    CacheProvider, CompoundQueryManager, InMemoryCacheProvider, QueryManager, QueryManager2,
    StandardStrategy,
};
use repocache_test_utils::assertions::{
    assert_cache_hit, assert_cache_miss, assert_key_type_mismatch, assert_provider_fault,
    assert_unsupported_expression,
};
use repocache_test_utils::fixtures::{
    self, kind_group, kind_is, name_selector, price_selector, sample_widgets, seeded, widget,
};
use repocache_test_utils::{init_tracing, FlakyCacheProvider, LineItem, RepositoryError, Widget};
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// GENERATIONAL INVALIDATION
// ============================================================================

#[test]
fn test_repeated_find_all_hits_after_first_call() {
    init_tracing();
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(1);

    repo.find_all(&spec, None).unwrap();
    assert_cache_miss(&repo);
    let executions = repo.executions();

    for _ in 0..5 {
        repo.find_all(&spec, None).unwrap();
        assert_cache_hit(&repo);
    }
    assert_eq!(repo.executions(), executions);
}

#[test]
fn test_every_mutation_forces_exactly_one_miss() {
    init_tracing();
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(2);

    let mutations: Vec<Box<dyn Fn(&fixtures::WidgetRepository)>> = vec![
        Box::new(|r: &fixtures::WidgetRepository| r.add(widget(100, 3, "added", 1.0)).unwrap()),
        Box::new(|r: &fixtures::WidgetRepository| r.update(widget(100, 3, "renamed", 2.0)).unwrap()),
        Box::new(|r: &fixtures::WidgetRepository| {
            r.delete(&100).unwrap();
        }),
        Box::new(|r: &fixtures::WidgetRepository| r.save().unwrap()),
    ];

    repo.find(&spec, None).unwrap();
    for mutate in mutations {
        repo.find(&spec, None).unwrap();
        assert_cache_hit(&repo);

        mutate(&repo);

        repo.find(&spec, None).unwrap();
        assert_cache_miss(&repo);
        repo.find(&spec, None).unwrap();
        assert_cache_hit(&repo);
    }
}

#[test]
fn test_end_to_end_kind_scenario() {
    init_tracing();
    let repo = fixtures::standard_repository();
    repo.add(widget(1, 1, "a", 1.0)).unwrap();
    repo.add(widget(2, 1, "b", 2.0)).unwrap();
    let spec = kind_is(1);

    let first = repo.find_all(&spec, None).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(first.len(), 2);

    let second = repo.find_all(&spec, None).unwrap();
    assert_cache_hit(&repo);
    assert_eq!(second, first);

    repo.add(widget(3, 1, "c", 3.0)).unwrap();
    let third = repo.find_all(&spec, None).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(third.len(), 3);
}

#[test]
fn test_get_is_served_from_write_through() {
    let repo = seeded(fixtures::standard_repository());
    let executions = repo.executions();

    let got = repo.get(&4).unwrap();
    assert_cache_hit(&repo);
    assert_eq!(got, Some(widget(4, 2, "dowel", 1.5)));

    repo.update(widget(4, 2, "dowel-xl", 1.75)).unwrap();
    assert_eq!(repo.get(&4).unwrap().map(|w| w.name), Some("dowel-xl".to_string()));
    assert_cache_hit(&repo);

    repo.delete(&4).unwrap();
    assert_eq!(repo.get(&4).unwrap(), None);
    assert_cache_hit(&repo);
    assert_eq!(repo.executions(), executions);
}

#[test]
fn test_captured_and_constant_predicates_share_entries() {
    let repo = seeded(fixtures::standard_repository());
    repo.count(Some(&kind_is(1))).unwrap();

    let wanted = 1;
    let captured = Specification::new(
        Expr::member("kind").equal_to(Expr::captured("wanted", move || json!(wanted))),
    );
    assert_eq!(repo.count(Some(&captured)).unwrap(), 3);
    assert_cache_hit(&repo);
}

#[test]
fn test_options_and_selectors_are_part_of_the_key() {
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(1);
    let by_name = QueryOptions::sorted_by("name");
    let by_price_desc = QueryOptions::sorted_by_descending("price").paged(1, 2);

    let names = repo.find_all_with(&spec, &name_selector(), Some(&by_name)).unwrap();
    assert_eq!(names, vec!["anvil", "bolt", "crank"]);

    let top = repo.find_all(&spec, Some(&by_price_desc)).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(top.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 3]);

    let page_two = repo
        .find_all(&spec, Some(&QueryOptions::sorted_by_descending("price").paged(2, 2)))
        .unwrap();
    assert_cache_miss(&repo);
    assert_eq!(page_two.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2]);

    repo.find_all_with(&spec, &name_selector(), Some(&by_name)).unwrap();
    assert_cache_hit(&repo);
}

#[test]
fn test_sort_terms_cannot_collide_with_one_odd_property() {
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(1);
    let odd = QueryOptions::sorted_by("name desc,price");
    let two_terms = QueryOptions::sorted_by_descending("name").then_by("price");

    let unsorted = repo.find_all_with(&spec, &name_selector(), Some(&odd)).unwrap();
    assert_eq!(unsorted, vec!["anvil", "bolt", "crank"]);

    let descending = repo.find_all_with(&spec, &name_selector(), Some(&two_terms)).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(descending, vec!["crank", "bolt", "anvil"]);
}

#[test]
fn test_aggregates_and_groups_are_cached() {
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(2);

    assert_eq!(repo.sum(Some(&spec), &price_selector()).unwrap(), 41.5);
    assert_eq!(repo.average(Some(&spec), &price_selector()).unwrap(), Some(20.75));
    assert_eq!(repo.min(None, &price_selector()).unwrap(), Some(0.25));
    assert_eq!(repo.max(None, &price_selector()).unwrap(), Some(40.0));
    assert_eq!(repo.long_count(None).unwrap(), 6);
    assert_eq!(
        repo.group_counts(None, &kind_group()).unwrap(),
        vec![(1, 3), (2, 2), (3, 1)]
    );
    let items = repo.group_items(Some(&spec), &kind_group(), &name_selector()).unwrap();
    assert_eq!(items, vec![(2, vec!["dowel".to_string(), "easel".to_string()])]);

    let executions = repo.executions();
    repo.sum(Some(&spec), &price_selector()).unwrap();
    repo.average(Some(&spec), &price_selector()).unwrap();
    repo.min(None, &price_selector()).unwrap();
    repo.max(None, &price_selector()).unwrap();
    repo.long_count(None).unwrap();
    repo.group_counts(None, &kind_group()).unwrap();
    repo.group_items(Some(&spec), &kind_group(), &name_selector()).unwrap();
    assert_cache_hit(&repo);
    assert_eq!(repo.executions(), executions);
}

#[test]
fn test_min_and_max_do_not_share_entries() {
    let repo = seeded(fixtures::standard_repository());
    let min = repo.min(None, &price_selector()).unwrap();
    let max = repo.max(None, &price_selector()).unwrap();
    assert_cache_miss(&repo);
    assert_ne!(min, max);
}

#[test]
fn test_get_many_and_get_all() {
    let repo = seeded(fixtures::standard_repository());
    let names = repo.get_many(&[6, 1], &name_selector()).unwrap();
    assert_eq!(names, vec!["funnel", "anvil"]);

    let reversed = repo.get_many(&[1, 6], &name_selector()).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(reversed, vec!["anvil", "funnel"]);

    assert_eq!(repo.get_all(None).unwrap().len(), 6);
    repo.get_all(None).unwrap();
    assert_cache_hit(&repo);

    let price = repo.get_with(&5, &price_selector()).unwrap();
    assert_eq!(price, Some(40.0));
}

#[test]
fn test_clear_cache_retires_everything() {
    let repo = seeded(fixtures::standard_repository());
    repo.count(None).unwrap();
    repo.get(&1).unwrap();
    assert_cache_hit(&repo);

    repo.cache().clear_cache().unwrap();
    repo.count(None).unwrap();
    assert_cache_miss(&repo);
    repo.get(&1).unwrap();
    assert_cache_miss(&repo);
}

#[test]
fn test_disabled_cache_executes_every_time() {
    let repo = seeded(fixtures::standard_repository());
    repo.cache().set_cache_enabled(false);
    let executions = repo.executions();

    repo.count(None).unwrap();
    repo.count(None).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(repo.executions(), executions + 2);
}

// ============================================================================
// PARTITIONED INVALIDATION
// ============================================================================

#[test]
fn test_partitioned_mutation_leaves_other_partitions_cached() {
    init_tracing();
    let repo = seeded(fixtures::partitioned_repository());
    let kind_one = kind_is(1);
    let kind_two = kind_is(2);

    repo.find_all(&kind_one, None).unwrap();
    repo.find_all(&kind_two, None).unwrap();
    repo.count(None).unwrap();

    repo.add(widget(7, 1, "gear", 5.0)).unwrap();

    let two = repo.find_all(&kind_two, None).unwrap();
    assert_cache_hit(&repo);
    assert_eq!(two.len(), 2);

    let one = repo.find_all(&kind_one, None).unwrap();
    assert_cache_miss(&repo);
    assert_eq!(one.len(), 4);

    assert_eq!(repo.count(None).unwrap(), 7);
    assert_cache_miss(&repo);
}

#[test]
fn test_partitioned_conjunction_is_confined() {
    let repo = seeded(fixtures::partitioned_repository());
    let cheap_kind_two = Specification::new(
        Expr::member("kind")
            .equal_to(Expr::constant(2))
            .and(Expr::member("price").less_than(Expr::constant(10))),
    );
    assert_eq!(repo.find_all(&cheap_kind_two, None).unwrap().len(), 1);

    repo.update(widget(6, 3, "funnel", 4.0)).unwrap();
    repo.find_all(&cheap_kind_two, None).unwrap();
    assert_cache_hit(&repo);
}

#[test]
fn test_partitioned_disjunction_is_cross_partition() {
    let repo = seeded(fixtures::partitioned_repository());
    let either = kind_is(1).or(kind_is(2));
    assert_eq!(repo.count(Some(&either)).unwrap(), 5);

    repo.add(widget(8, 3, "hinge", 2.0)).unwrap();
    repo.count(Some(&either)).unwrap();
    assert_cache_miss(&repo);
}

#[test]
fn test_partitioned_update_moving_between_partitions() {
    let repo = seeded(fixtures::partitioned_repository());
    let kind_one = kind_is(1);
    let kind_two = kind_is(2);
    assert_eq!(repo.count(Some(&kind_one)).unwrap(), 3);
    assert_eq!(repo.count(Some(&kind_two)).unwrap(), 2);

    repo.update(widget(1, 2, "anvil", 12.5)).unwrap();

    assert_eq!(repo.count(Some(&kind_one)).unwrap(), 2);
    assert_cache_miss(&repo);
    assert_eq!(repo.count(Some(&kind_two)).unwrap(), 3);
    assert_cache_miss(&repo);
}

#[test]
fn test_partitioned_save_retires_confined_results() {
    let repo = seeded(fixtures::partitioned_repository());
    let kind_three = kind_is(3);
    repo.count(Some(&kind_three)).unwrap();
    repo.save().unwrap();
    repo.count(Some(&kind_three)).unwrap();
    assert_cache_miss(&repo);
}

// ============================================================================
// TIMEOUT AND NO-CACHE
// ============================================================================

#[test]
fn test_timeout_get_hits_within_window_and_expires_after() {
    let repo = fixtures::timeout_repository(Duration::from_millis(150));
    repo.add(widget(1, 1, "a", 1.0)).unwrap();
    repo.get(&1).unwrap();
    assert_cache_hit(&repo);

    repo.add(widget(2, 1, "b", 1.0)).unwrap();
    repo.save().unwrap();
    repo.get(&1).unwrap();
    assert_cache_hit(&repo);

    thread::sleep(Duration::from_millis(300));
    repo.get(&1).unwrap();
    assert_cache_miss(&repo);
}

#[test]
fn test_timeout_query_results_may_be_stale_until_expiry() {
    let repo = fixtures::timeout_repository(Duration::from_millis(150));
    repo.add(widget(1, 1, "a", 1.0)).unwrap();
    assert_eq!(repo.count(None).unwrap(), 1);

    repo.add(widget(2, 1, "b", 1.0)).unwrap();
    assert_eq!(repo.count(None).unwrap(), 1);
    assert_cache_hit(&repo);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(repo.count(None).unwrap(), 2);
    assert_cache_miss(&repo);
}

#[test]
fn test_timeout_get_sees_update_inside_window() {
    let repo = fixtures::timeout_repository(Duration::from_secs(60));
    repo.add(widget(1, 1, "a", 1.0)).unwrap();
    repo.update(widget(1, 1, "b", 1.0)).unwrap();
    assert_eq!(repo.get(&1).unwrap().map(|w| w.name), Some("b".to_string()));
    assert_cache_hit(&repo);
}

#[test]
fn test_no_cache_never_hits() {
    let repo = fixtures::no_cache_repository();
    assert_eq!(repo.cache().strategy_name(), "no-cache");
    for w in sample_widgets() {
        repo.add(w).unwrap();
    }
    repo.update(widget(1, 1, "x", 1.0)).unwrap();
    repo.delete(&2).unwrap();
    repo.save().unwrap();

    for _ in 0..3 {
        repo.find_all(&kind_is(1), None).unwrap();
        assert_cache_miss(&repo);
        repo.get(&1).unwrap();
        assert_cache_miss(&repo);
    }
}

#[test]
fn test_missing_strategy_falls_back_to_no_cache() {
    let manager = QueryManager::<Widget, u32>::new(None);
    assert_eq!(manager.strategy_name(), "no-cache");
    assert!(manager.cache_enabled());
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_closure_predicate_is_rejected() {
    let repo = seeded(fixtures::standard_repository());
    let spec = Specification::new(Expr::custom("expensive", |_| true));
    let executions = repo.executions();

    let result = repo.find_all(&spec, None);
    assert_unsupported_expression(&result);
    assert_eq!(repo.executions(), executions);
}

#[test]
fn test_provider_fault_propagates() {
    init_tracing();
    let provider = Arc::new(FlakyCacheProvider::new());
    let repo = seeded(fixtures::widget_repository_with(
        StrategyConfig::Standard,
        Arc::clone(&provider) as Arc<dyn CacheProvider>,
    ));
    let executions = repo.executions();

    provider.set_down(true);
    assert_provider_fault(&repo.count(None));
    assert_provider_fault(&repo.get(&1));
    assert_eq!(repo.executions(), executions);

    provider.set_down(false);
    assert_eq!(repo.count(None).unwrap(), 6);
}

#[test]
fn test_compound_key_type_mismatch_fails_fast() {
    let manager = CompoundQueryManager::<LineItem>::with_strategy(StandardStrategy::new(
        Arc::new(InMemoryCacheProvider::new()),
        repocache_storage::KeyScope::for_entity::<LineItem>("test"),
    ))
    .with_key_shape(vec![KeyKind::Uuid, KeyKind::Integer]);

    let key = CompoundKey::from([json!(Uuid::now_v7()), json!("one")]);
    let result: RepoCacheResult<Option<LineItem>> =
        manager.execute_get(&key, || panic!("store must not be queried"));
    assert_key_type_mismatch(&result, 1);

    let short = CompoundKey::from([json!(Uuid::now_v7())]);
    let result = manager.execute_get(&short, || -> RepoCacheResult<Option<LineItem>> { Ok(None) });
    assert!(matches!(result, Err(RepoCacheError::Key(_))));
}

#[test]
fn test_two_part_keys() {
    let repo = fixtures::line_item_repository();
    let order = Uuid::now_v7();
    repo.add(fixtures::line_item(order, 1, "bolt", 10)).unwrap();
    repo.add(fixtures::line_item(order, 2, "nut", 10)).unwrap();

    assert_eq!(repo.get(&(order, 2)).unwrap().map(|i| i.sku), Some("nut".to_string()));
    assert_cache_hit(&repo);
    assert_eq!(repo.get(&(order, 3)).unwrap(), None);
    assert_cache_miss(&repo);

    let _typed: &QueryManager2<LineItem, Uuid, u32> = repo.cache();
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_add_during_count_is_not_hidden_by_stale_result() {
    let repo = seeded(fixtures::standard_repository());
    let spec = kind_is(1);
    let before = 3;

    // The store answers with the old count while another writer adds.
    let raced = repo
        .cache()
        .execute_count(Some(&spec), || {
            repo.add(widget(50, 1, "late", 1.0))?;
            Ok::<_, RepositoryError>(before)
        })
        .unwrap();
    assert_eq!(raced, before);

    assert_eq!(repo.count(Some(&spec)).unwrap(), before + 1);
    assert_cache_miss(&repo);
    assert_eq!(repo.count(Some(&spec)).unwrap(), before + 1);
    assert_cache_hit(&repo);
}

#[test]
fn test_delete_during_get_is_not_hidden_by_stale_entity() {
    let repo = seeded(fixtures::standard_repository());
    repo.cache().clear_cache().unwrap();

    let raced = repo
        .cache()
        .execute_get(&4, || {
            let old = Some(widget(4, 2, "dowel", 1.5));
            repo.delete(&4)?;
            Ok::<_, RepositoryError>(old)
        })
        .unwrap();
    assert!(raced.is_some());

    assert_eq!(repo.get(&4).unwrap(), None);
}

#[test]
fn test_shared_provider_across_threads() {
    let provider: Arc<dyn CacheProvider> = Arc::new(InMemoryCacheProvider::new());
    let repo = Arc::new(seeded(fixtures::widget_repository_with(
        StrategyConfig::Standard,
        Arc::clone(&provider),
    )));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for i in 0..25u32 {
                    let id = 1000 + t * 100 + i;
                    repo.add(widget(id, (i % 3) as i32 + 1, "w", 1.0)).unwrap();
                    repo.count(Some(&kind_is(1))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = 3 + (0..25u32).filter(|i| i % 3 == 0).count() * 4;
    assert_eq!(repo.count(Some(&kind_is(1))).unwrap(), expected);
}
