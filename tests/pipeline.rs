use std::sync::Arc;

use netdesign::analysis::{risk_from_score, Analyzer};
use netdesign::features::{extract, FEATURE_ORDER};
use netdesign::scoring::{ForestParams, ModelCache};
use netdesign::simulate::SyntheticSimulator;
use netdesign::suggest::{suggest, SuggestionKind};
use netdesign::topology::Topology;
use netdesign::training;

fn star() -> Topology {
    Topology::from_json(
        r#"{
            "nodes": ["h1", "h2", "s1"],
            "links": [
                {"src": "h1", "dst": "s1", "bw": 10, "delay": "5ms"},
                {"src": "h2", "dst": "s1", "bw": 10, "delay": "5ms"}
            ],
            "flows": [{"src": "h1", "dst": "h2", "rate": 5}]
        }"#,
    )
    .unwrap()
}

fn trained_analyzer() -> Analyzer {
    let rows = training::generate_dataset(200, 42);
    let params = ForestParams {
        n_estimators: 100,
        ..Default::default()
    };
    let artifact = training::train(&rows, &params, 42).unwrap();
    Analyzer::new(
        Arc::new(SyntheticSimulator::new(Some(42))),
        Arc::new(ModelCache::preloaded(artifact.into_scorer().unwrap())),
    )
}

#[test]
fn test_reference_topology_features() {
    let f = extract(&star());
    assert_eq!(f.avg_bandwidth, 10.0);
    assert_eq!(f.num_links, 2.0);
    assert_eq!(f.utilization_ratio, 0.25);
    assert_eq!(f.simulated_latency, 6.25);
}

#[test]
fn test_training_and_scoring_orders_identical() {
    let csv = training::dataset_to_csv(&training::generate_dataset(1, 0)).unwrap();
    let training_columns: Vec<String> = csv
        .lines()
        .next()
        .unwrap()
        .split(',')
        .map(str::to_string)
        .collect();

    let artifact = training::train(&training::generate_dataset(30, 0), &ForestParams::default(), 0).unwrap();
    let scorer = artifact.into_scorer().unwrap();

    let extractor_columns: Vec<String> = extract(&star()).named().map(|(n, _)| n.to_string()).collect();

    assert_eq!(training_columns, scorer.feature_names());
    assert_eq!(extractor_columns, scorer.feature_names());
    assert_eq!(extractor_columns, FEATURE_ORDER.to_vec());
}

#[tokio::test]
async fn test_end_to_end_risk_broadcast() {
    let analyzer = trained_analyzer();
    let result = analyzer.analyze(&star()).await.unwrap();

    let expected = risk_from_score(result.global.anomaly_score);
    assert!((0.0..=1.0).contains(&expected));
    assert!(result.topology.nodes.iter().all(|n| n.risk == expected));
    assert!(result.topology.links.iter().all(|l| l.risk == expected));
    assert!(result.topology.links.iter().all(|l| l.utilization == 0.25));
    assert_eq!(result.metrics.latency_vs_flows.y, 6.25);
}

#[tokio::test]
async fn test_overloaded_topology_is_anomalous() {
    let analyzer = trained_analyzer();
    let mut topo = star();
    for link in &mut topo.links {
        link.bandwidth = 3.0;
    }
    for _ in 0..30 {
        topo.flows.push(topo.flows[0].clone());
    }
    topo.flows.iter_mut().for_each(|f| f.rate = 400.0);

    let normal = analyzer.analyze(&star()).await.unwrap();
    let result = analyzer.analyze(&topo).await.unwrap();
    assert!(result.global.is_anomaly);
    assert!(result.global.anomaly_score < 0.0);
    assert!(result.global.anomaly_score < normal.global.anomaly_score);

    let recs = suggest(&result).recommendations;
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].kind, SuggestionKind::Bandwidth);
    assert_eq!(recs[0].target, "h1 → s1");
    assert_eq!(recs[1].target, "h2 → s1");
    assert_eq!(recs[2].kind, SuggestionKind::Topology);
}

#[tokio::test]
async fn test_concurrent_requests_share_model() {
    let analyzer = trained_analyzer();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let analyzer = analyzer.clone();
        handles.push(tokio::spawn(async move { analyzer.analyze(&star()).await }));
    }
    let mut scores = Vec::new();
    for handle in handles {
        scores.push(handle.await.unwrap().unwrap().global.anomaly_score);
    }
    assert!(scores.windows(2).all(|w| w[0] == w[1]));
}
