// Integration tests for the anticipatory routing cache
//
// Cached paths are served as-is until the caller refreshes them; new
// observations never reach the cache on their own.

use meshsight_core::{ObservationMetadata, TopologyPredictor};

fn solid_link(predictor: &mut TopologyPredictor, from: &str, to: &str, latency: f64) {
    for _ in 0..20 {
        predictor
            .observe(from, to, true, Some(ObservationMetadata::with_latency(latency)))
            .unwrap();
    }
}

#[test]
fn test_cache_isolation() {
    let mut predictor = TopologyPredictor::new();
    solid_link(&mut predictor, "A", "B", 10.0);

    assert!(predictor.calculate_optimal_path("A", "B").is_some());
    assert!(predictor.get_path("A", "B").is_none());

    println!("✓ Cache never computes on a miss");
}

#[test]
fn test_anticipate_stores_path() {
    let mut predictor = TopologyPredictor::new();
    solid_link(&mut predictor, "A", "B", 10.0);
    solid_link(&mut predictor, "B", "C", 10.0);

    predictor.anticipate_route("A", "C");

    let cached = predictor.get_path("A", "C").expect("path cached on anticipation");
    assert_eq!(cached.node_ids(), vec!["A", "B", "C"]);
    assert_eq!(
        Some(cached),
        predictor.calculate_optimal_path("A", "C").as_ref()
    );
    assert_eq!(
        predictor.anticipated_routes(),
        vec![("A".to_string(), "C".to_string())]
    );
}

#[test]
fn test_cache_not_invalidated_by_observations() {
    let mut predictor = TopologyPredictor::new();
    solid_link(&mut predictor, "A", "B", 10.0);
    solid_link(&mut predictor, "B", "C", 10.0);
    predictor.anticipate_route("A", "C");

    // A fast, reliable direct link appears
    solid_link(&mut predictor, "A", "C", 1.0);
    assert_eq!(
        predictor.calculate_optimal_path("A", "C").unwrap().hop_count(),
        1
    );

    // Cache still serves the old two-hop route
    assert_eq!(predictor.get_path("A", "C").unwrap().hop_count(), 2);

    let report = predictor.refresh_paths();
    assert_eq!(report.refreshed, 1);
    assert!(report.unreachable.is_empty());
    assert_eq!(predictor.get_path("A", "C").unwrap().hop_count(), 1);

    println!("✓ Refresh picks up the new direct link");
}

#[test]
fn test_unreachable_anticipation_fills_on_refresh() {
    let mut predictor = TopologyPredictor::new();
    predictor.anticipate_route("A", "C");
    assert!(predictor.get_path("A", "C").is_none());

    solid_link(&mut predictor, "A", "C", 10.0);
    assert!(predictor.get_path("A", "C").is_none());

    predictor.refresh_paths();
    assert!(predictor.get_path("A", "C").is_some());
}

#[test]
fn test_refresh_drops_routes_that_disappeared() {
    let mut predictor = TopologyPredictor::new();
    solid_link(&mut predictor, "A", "B", 10.0);
    for _ in 0..5 {
        predictor.observe("B", "C", true, None).unwrap();
    }
    predictor.anticipate_route("A", "C");
    assert!(predictor.get_path("A", "C").is_some());

    // B -> C turns out to be dead
    for _ in 0..30 {
        predictor.observe("B", "C", false, None).unwrap();
    }
    predictor.resolve_topology();
    assert!(predictor.connection("B", "C").is_none());

    // Stale entry is served until the caller refreshes
    assert!(predictor.get_path("A", "C").is_some());

    let report = predictor.refresh_paths();
    assert_eq!(report.refreshed, 0);
    assert_eq!(report.unreachable, vec![("A".to_string(), "C".to_string())]);
    assert!(predictor.get_path("A", "C").is_none());
}

#[test]
fn test_forget_route() {
    let mut predictor = TopologyPredictor::new();
    solid_link(&mut predictor, "A", "B", 10.0);
    predictor.anticipate_route("A", "B");

    assert!(predictor.forget_route("A", "B"));
    assert!(predictor.get_path("A", "B").is_none());
    assert!(predictor.anticipated_routes().is_empty());

    let report = predictor.refresh_paths();
    assert_eq!(report.refreshed, 0);
}
