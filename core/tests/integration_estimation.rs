// Integration tests for link estimation and topology resolution
//
// Drives the public predictor API with observation streams and checks the
// statistical behaviour callers rely on: convergence, divergence, entropy,
// pruning and idempotent resolution.

use meshsight_core::{
    ConnectionPrediction, ObservationMetadata, PredictorConfig, TopologyPredictor, UpdateRule,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_convergence_on_success() {
    let mut predictor = TopologyPredictor::new();
    // Publish a snapshot up front so every observation is visible to queries
    predictor.bootstrap_discovery("127.0.0.1:7000");

    let mut last_probability = 0.0;
    let mut last_confidence = 0.0;
    for i in 1..=25u64 {
        predictor.observe("A", "B", true, None).unwrap();
        let prediction = predictor.predict_connection("A", "B");

        assert!(prediction.probability >= last_probability);
        if i <= 20 {
            assert!(prediction.confidence > last_confidence);
        } else {
            assert_eq!(prediction.confidence, 1.0);
        }
        last_probability = prediction.probability;
        last_confidence = prediction.confidence;

        if i == 10 {
            assert!(prediction.probability > 0.8);
            assert!(prediction.exists);
        }
    }

    println!("✓ All-success link converges: p = {:.4}", last_probability);
}

#[test]
fn test_divergence_on_failure() {
    let mut predictor = TopologyPredictor::new();

    for _ in 0..15 {
        predictor.observe("A", "B", false, None).unwrap();
    }

    let prediction = predictor.predict_connection("A", "B");
    assert!(prediction.probability < 0.3);
    assert!(!prediction.exists);

    println!("✓ All-failure link diverges: p = {:.4}", prediction.probability);
}

#[test]
fn test_default_prediction_for_unobserved_pair() {
    let mut predictor = TopologyPredictor::new();
    predictor.observe("A", "B", true, None).unwrap();

    assert_eq!(
        predictor.predict_connection("X", "Y"),
        ConnectionPrediction {
            exists: false,
            probability: 0.5,
            confidence: 0.0,
        }
    );
    // Links are directional
    assert_eq!(predictor.predict_connection("B", "A"), ConnectionPrediction::UNKNOWN);
}

#[test]
fn test_entropy_decreases_as_link_converges() {
    let mut predictor = TopologyPredictor::new();
    predictor.seed_estimate("C", "D", 0.6, 0.2).unwrap();

    predictor.observe("A", "B", true, None).unwrap();
    let mut last = predictor.metrics();

    for _ in 0..30 {
        predictor.observe("A", "B", true, None).unwrap();
        let metrics = predictor.metrics();
        assert!(metrics.entropy < last.entropy);
        assert!(metrics.confidence > last.confidence);
        assert_eq!(metrics.connections, 2);
        last = metrics;
    }

    println!("✓ Topology entropy fell to {:.4}", last.entropy);
}

#[test]
fn test_predictions_come_from_published_snapshot() {
    let mut predictor = TopologyPredictor::new();
    for _ in 0..3 {
        predictor.observe("A", "B", true, None).unwrap();
    }
    assert!(predictor.topology().is_none());
    assert_eq!(predictor.predict_connection("A", "B"), ConnectionPrediction::UNKNOWN);

    predictor.resolve_topology();
    for _ in 0..5 {
        predictor.observe("C", "D", true, None).unwrap();
    }

    let snapshot = predictor.topology().unwrap();
    let metrics = predictor.metrics();
    assert_eq!(snapshot.connections.len(), metrics.connections);
    assert_eq!(snapshot.entropy, metrics.entropy);
    assert_eq!(snapshot.confidence, metrics.confidence);
    assert!(predictor.predict_connection("C", "D").exists);

    println!("✓ Snapshot entropy {:.4} matches the live model", snapshot.entropy);
}

#[test]
fn test_empty_model_has_zero_entropy() {
    let predictor = TopologyPredictor::new();
    let metrics = predictor.metrics();
    assert_eq!(metrics.entropy, 0.0);
    assert_eq!(metrics.confidence, 1.0);
    assert_eq!(metrics.connections, 0);
    assert_eq!(metrics.observations, 0);
}

#[test]
fn test_resolution_prunes_confident_absent_links() {
    let mut predictor = TopologyPredictor::new();

    // 11 failures: confidence 0.55 > 0.5, probability far below 0.7
    for _ in 0..11 {
        predictor.observe("A", "B", false, None).unwrap();
    }
    // Still present until the next pass
    assert!(predictor.connection("A", "B").is_some());

    let snapshot = predictor.resolve_topology();
    assert!(snapshot.connection("A", "B").is_none());
    assert!(predictor.connection("A", "B").is_none());
    assert_eq!(predictor.predict_connection("A", "B"), ConnectionPrediction::UNKNOWN);

    println!("✓ Confidently absent link pruned by resolution");
}

#[test]
fn test_resolution_keeps_undecided_links() {
    let mut predictor = TopologyPredictor::new();

    // 10 failures: confidence exactly 0.5, not enough to decide
    for _ in 0..10 {
        predictor.observe("A", "B", false, None).unwrap();
    }
    let snapshot = predictor.topology().expect("pass runs on the 10th observation");
    assert!(snapshot.connection("A", "B").is_some());
}

#[test]
fn test_resolution_is_idempotent() {
    let mut predictor = TopologyPredictor::new();
    for _ in 0..12 {
        predictor.observe("A", "B", true, None).unwrap();
        predictor.observe("B", "C", false, None).unwrap();
    }
    predictor.observe("C", "D", true, None).unwrap();

    let first = predictor.resolve_topology();
    let second = predictor.resolve_topology();

    assert!(first.same_contents(&second));
    assert_eq!(first.connections, second.connections);
    assert_eq!(first.entropy, second.entropy);
    assert_eq!(first.confidence, second.confidence);

    println!("✓ Two resolution passes agree on {} link(s)", first.connections.len());
}

#[test]
fn test_resolve_without_state_gives_empty_snapshot() {
    let mut predictor = TopologyPredictor::new();
    assert!(predictor.topology().is_none());

    let snapshot = predictor.resolve_topology();
    assert!(snapshot.nodes.is_empty());
    assert!(snapshot.connections.is_empty());
    assert_eq!(snapshot.entropy, 0.0);
    assert_eq!(snapshot.confidence, 1.0);
    assert!(predictor.topology().is_some());
}

#[test]
fn test_published_snapshot_is_not_mutated() {
    let mut predictor = TopologyPredictor::new();
    predictor.observe("A", "B", true, None).unwrap();
    let snapshot = predictor.resolve_topology();
    let before = snapshot.connection("A", "B").unwrap().observation_count;

    for _ in 0..5 {
        predictor.observe("A", "B", true, None).unwrap();
    }

    assert_eq!(snapshot.connection("A", "B").unwrap().observation_count, before);
    assert_eq!(predictor.connection("A", "B").unwrap().observation_count, before + 5);
}

#[test]
fn test_latency_and_bandwidth_tracking() {
    let mut predictor = TopologyPredictor::new();
    predictor
        .observe("A", "B", true, Some(ObservationMetadata::with_latency(40.0).and_bandwidth(800.0)))
        .unwrap();
    predictor
        .observe("A", "B", true, Some(ObservationMetadata::with_latency(20.0)))
        .unwrap();

    let estimate = predictor.connection("A", "B").unwrap();
    assert!((estimate.latency_estimate.unwrap() - 34.0).abs() < 1e-9);
    assert_eq!(estimate.bandwidth_estimate, Some(800.0));
}

#[test]
fn test_noisy_links_separate() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut predictor = TopologyPredictor::new();

    for _ in 0..200 {
        let good = rng.gen_bool(0.95);
        let bad = rng.gen_bool(0.1);
        predictor.observe("A", "B", good, None).unwrap();
        predictor.observe("C", "D", bad, None).unwrap();
    }

    let good = predictor.predict_connection("A", "B");
    let bad = predictor.predict_connection("C", "D");
    assert!(good.exists, "reliable link should be predicted: {:?}", good);
    assert!(good.probability > 0.8);
    assert!(bad.probability < 0.7, "flaky link should not be predicted: {:?}", bad);

    println!(
        "✓ Noisy links separated: good p = {:.3}, bad p = {:.3}",
        good.probability, bad.probability
    );
}

#[test]
fn test_laplace_rule_end_to_end() {
    let config = PredictorConfig {
        update_rule: UpdateRule::Laplace,
        ..Default::default()
    };
    let mut predictor = TopologyPredictor::with_config(config).unwrap();

    for _ in 0..10 {
        predictor.observe("A", "B", true, None).unwrap();
    }
    for _ in 0..15 {
        predictor.observe("C", "D", false, None).unwrap();
    }

    let good = predictor.predict_connection("A", "B");
    assert!((good.probability - 11.0 / 12.0).abs() < 1e-12);
    let estimate = predictor.connection("A", "B").unwrap();
    assert_eq!(estimate.successes, 10);
    assert_eq!(estimate.failures, 0);

    // C -> D had only 10 observations at the pass on the 20th, so it survives
    assert!(predictor.connection("C", "D").is_some());
    assert!(predictor.predict_connection("C", "D").probability < 0.3);
}

#[test]
fn test_custom_resolution_interval() {
    let config = PredictorConfig {
        resolution_interval: 3,
        ..Default::default()
    };
    let mut predictor = TopologyPredictor::with_config(config).unwrap();
    predictor.observe("A", "B", true, None).unwrap();
    predictor.observe("A", "B", true, None).unwrap();
    assert!(predictor.topology().is_none());
    predictor.observe("A", "B", true, None).unwrap();
    assert!(predictor.topology().is_some());
}

proptest! {
    #[test]
    fn prop_estimates_stay_in_unit_interval(
        steps in proptest::collection::vec((0usize..4, 0usize..4, any::<bool>(), proptest::option::of(0.0f64..5000.0)), 1..200)
    ) {
        let ids = ["n0", "n1", "n2", "n3"];
        let mut predictor = TopologyPredictor::new();

        for (from, to, success, latency) in steps {
            let metadata = latency.map(ObservationMetadata::with_latency);
            predictor.observe(ids[from], ids[to], success, metadata).unwrap();
        }

        for from in ids {
            for to in ids {
                if let Some(estimate) = predictor.connection(from, to) {
                    prop_assert!((0.0..=1.0).contains(&estimate.probability));
                    prop_assert!((0.0..=1.0).contains(&estimate.confidence));
                    prop_assert_eq!(estimate.observation_count, estimate.successes + estimate.failures);
                }
            }
        }

        let metrics = predictor.metrics();
        prop_assert!((0.0..=1.0).contains(&metrics.entropy));
        prop_assert!((0.0..=1.0).contains(&metrics.confidence));
    }
}
