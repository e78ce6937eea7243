//! Offline training job: synthetic topology corpus -> feature table -> model.
//!
//! Every corpus row goes through the same [`extract`] the serving path uses,
//! and the CSV header is [`FEATURE_ORDER`], so train/score symmetry holds by
//! construction.

use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::features::{extract, FeatureVector, FEATURE_ORDER};
use crate::scoring::{ForestParams, IsolationForest, ModelArtifact};
use crate::topology::{Delay, Flow, Link, Topology};

/// Generate one random host/switch topology.
///
/// 2-6 hosts and 1-3 switches; every host hangs off a random switch with
/// 10-100 bandwidth and 1-20 ms delay; 1..=hosts flows of rate 1-15 between
/// two distinct hosts.
pub fn generate_random_topology<R: Rng + ?Sized>(rng: &mut R) -> Topology {
    let num_hosts = rng.gen_range(2..=6);
    let num_switches = rng.gen_range(1..=3);

    let hosts: Vec<String> = (1..=num_hosts).map(|i| format!("h{}", i)).collect();
    let switches: Vec<String> = (1..=num_switches).map(|i| format!("s{}", i)).collect();

    let mut links = Vec::with_capacity(hosts.len());
    for host in &hosts {
        let Some(switch) = switches.choose(rng) else {
            continue;
        };
        links.push(Link {
            src: host.clone(),
            dst: switch.clone(),
            bandwidth: rng.gen_range(10..=100) as f64,
            delay: Delay::from_millis(rng.gen_range(1..=20) as f64),
        });
    }

    let num_flows = rng.gen_range(1..=num_hosts);
    let mut flows = Vec::with_capacity(num_flows);
    for _ in 0..num_flows {
        let pair = index::sample(rng, hosts.len(), 2);
        flows.push(Flow {
            src: hosts[pair.index(0)].clone(),
            dst: hosts[pair.index(1)].clone(),
            rate: rng.gen_range(1..=15) as f64,
        });
    }

    Topology {
        nodes: hosts.into_iter().chain(switches).collect(),
        links,
        flows,
    }
}

/// Build a corpus of `samples` feature vectors from random topologies.
pub fn generate_dataset(samples: usize, seed: u64) -> Vec<FeatureVector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples)
        .map(|_| extract(&generate_random_topology(&mut rng)))
        .collect()
}

/// Write the header and one row per vector. The header is written explicitly
/// so an empty corpus still carries its column order.
fn write_corpus<W: io::Write>(writer: W, rows: &[FeatureVector]) -> Result<W> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(FEATURE_ORDER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow!("failed to flush training corpus: {}", e.error()))
}

/// Serialize a corpus as CSV with a [`FEATURE_ORDER`] header.
pub fn dataset_to_csv(rows: &[FeatureVector]) -> Result<String> {
    let bytes = write_corpus(Vec::new(), rows)?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse a CSV corpus. The header must match [`FEATURE_ORDER`] exactly.
pub fn dataset_from_csv(content: &str) -> Result<Vec<FeatureVector>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("failed to read corpus header")?.clone();
    if headers.is_empty() {
        bail!("training corpus is empty");
    }
    if headers.iter().ne(FEATURE_ORDER) {
        bail!(
            "training corpus columns {:?} do not match feature order {:?}",
            headers.iter().collect::<Vec<_>>(),
            FEATURE_ORDER
        );
    }

    let mut rows = Vec::new();
    for result in reader.deserialize::<FeatureVector>() {
        let row = result.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            anyhow!("line {}: {}", line, e)
        })?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_dataset(path: &Path, rows: &[FeatureVector]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to write training corpus: {}", path.display()))?;
    write_corpus(file, rows)
        .with_context(|| format!("failed to write training corpus: {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "training corpus written");
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Vec<FeatureVector>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read training corpus: {}", path.display()))?;
    dataset_from_csv(&content).with_context(|| format!("invalid training corpus: {}", path.display()))
}

/// Fit the detector on a corpus and wrap it as a versioned artifact.
pub fn train(rows: &[FeatureVector], params: &ForestParams, seed: u64) -> Result<ModelArtifact> {
    let data: Vec<Vec<f64>> = rows.iter().map(FeatureVector::to_vector).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let model = IsolationForest::fit(&data, params, &mut rng).context("failed to fit isolation forest")?;

    info!(
        rows = rows.len(),
        trees = model.n_estimators(),
        contamination = params.contamination,
        offset = model.offset(),
        "model trained"
    );

    Ok(ModelArtifact::new(
        model,
        FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
        params.contamination,
        rows.len(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::validate;

    #[test]
    fn test_random_topologies_are_valid() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let topo = generate_random_topology(&mut rng);
            let hosts = topo.hosts().count();
            let switches = topo.switches().count();
            assert!((2..=6).contains(&hosts));
            assert!((1..=3).contains(&switches));
            assert_eq!(topo.links.len(), hosts);
            assert!((1..=hosts).contains(&topo.flows.len()));
            for flow in &topo.flows {
                assert_ne!(flow.src, flow.dst);
                assert!((1.0..=15.0).contains(&flow.rate));
            }
            for link in &topo.links {
                assert!((10.0..=100.0).contains(&link.bandwidth));
                assert!((1.0..=20.0).contains(&link.delay.as_millis()));
            }
            validate(&topo).unwrap();
        }
    }

    #[test]
    fn test_dataset_is_seeded() {
        assert_eq!(generate_dataset(20, 3), generate_dataset(20, 3));
        assert_ne!(generate_dataset(20, 3), generate_dataset(20, 4));
    }

    #[test]
    fn test_csv_header_is_feature_order() {
        let csv = dataset_to_csv(&generate_dataset(3, 1)).unwrap();
        let header = csv.lines().next().unwrap();
        let columns: Vec<&str> = header.split(',').collect();
        assert_eq!(columns, FEATURE_ORDER.to_vec());
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_csv_roundtrip() {
        let rows = generate_dataset(10, 8);
        let parsed = dataset_from_csv(&dataset_to_csv(&rows).unwrap()).unwrap();
        assert_eq!(parsed.len(), rows.len());
        assert_eq!(parsed[0].num_nodes, rows[0].num_nodes);
        assert_eq!(parsed[9].flow_count, rows[9].flow_count);
    }

    #[test]
    fn test_csv_rejects_reordered_header() {
        let mut columns = FEATURE_ORDER.to_vec();
        columns.swap(2, 3);
        let csv = format!("{}\n", columns.join(","));
        assert!(dataset_from_csv(&csv).is_err());
        assert!(dataset_from_csv("").is_err());
    }

    #[test]
    fn test_csv_accepts_quoted_cells() {
        let header: Vec<String> = FEATURE_ORDER.iter().map(|c| format!("\"{}\"", c)).collect();
        let row: Vec<String> = (0..FEATURE_ORDER.len()).map(|i| format!("\"{}\"", i)).collect();
        let csv = format!("{}\r\n{}\r\n", header.join(","), row.join(","));

        let parsed = dataset_from_csv(&csv).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].num_nodes, 0.0);
        assert_eq!(parsed[0].throughput, 14.0);
    }

    #[test]
    fn test_csv_rejects_short_row() {
        let csv = format!("{}\n1,2,3\n", FEATURE_ORDER.join(","));
        let err = dataset_from_csv(&csv).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_train_flags_about_contamination() {
        let rows = generate_dataset(200, 42);
        let params = ForestParams {
            n_estimators: 50,
            ..Default::default()
        };
        let artifact = train(&rows, &params, 42).unwrap();
        assert_eq!(artifact.feature_names, FEATURE_ORDER.to_vec());
        assert_eq!(artifact.training_rows, 200);

        let flagged = rows
            .iter()
            .filter(|r| artifact.model.is_outlier(&r.to_vector()))
            .count();
        assert!(flagged <= 16, "flagged {} of 200", flagged);
        assert!(flagged > 0);
    }
}
