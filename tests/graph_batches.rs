// ABOUTME: Property tests for batch construction over generated dependency graphs.
// ABOUTME: Acyclic manifests always partition cleanly; cycles always error.

use convoy::graph::{self, GraphError};
use convoy::manifest::Manifest;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Build a manifest of `masks.len()` services where unit `i` depends on the
/// earlier units selected by bits of `masks[i]`. Construction guarantees
/// acyclicity: edges only point backwards in declaration order.
fn manifest_from_masks(masks: &[u32]) -> Manifest {
    let mut yaml = String::from("units:\n");
    for (i, mask) in masks.iter().enumerate() {
        let deps: Vec<String> = (0..i)
            .filter(|j| mask & (1 << j) != 0)
            .map(|j| format!("u{j}"))
            .collect();
        yaml.push_str(&format!(
            "  - name: u{i}\n    kind: service\n    depends_on: [{}]\n    start: [\"up\", \"u{i}\"]\n    probe: {{tcp: \"localhost:{}\"}}\n",
            deps.join(", "),
            1000 + i,
        ));
    }
    Manifest::from_yaml(&yaml).expect("generated manifest should parse")
}

proptest! {
    #[test]
    fn acyclic_graphs_partition_every_unit_exactly_once(
        masks in prop::collection::vec(any::<u32>(), 1..10)
    ) {
        let manifest = manifest_from_masks(&masks);
        let units: Vec<_> = manifest.units().collect();
        let batches = graph::build(&units).expect("acyclic graph must build");

        let mut seen: Vec<&str> = Vec::new();
        for batch in &batches {
            for name in batch.iter() {
                seen.push(name.as_str());
            }
        }
        let unique: HashSet<&&str> = seen.iter().collect();
        prop_assert_eq!(seen.len(), units.len());
        prop_assert_eq!(unique.len(), units.len());
    }

    #[test]
    fn dependencies_always_land_in_strictly_earlier_batches(
        masks in prop::collection::vec(any::<u32>(), 1..10)
    ) {
        let manifest = manifest_from_masks(&masks);
        let units: Vec<_> = manifest.units().collect();
        let batches = graph::build(&units).expect("acyclic graph must build");

        let mut batch_of: HashMap<&str, usize> = HashMap::new();
        for (index, batch) in batches.iter().enumerate() {
            for name in batch.iter() {
                batch_of.insert(name.as_str(), index);
            }
        }

        for unit in &units {
            for dep in &unit.depends_on {
                prop_assert!(
                    batch_of[dep.as_str()] < batch_of[unit.name.as_str()],
                    "{} depends on {} but batches are {} and {}",
                    unit.name,
                    dep,
                    batch_of[unit.name.as_str()],
                    batch_of[dep.as_str()],
                );
            }
        }
    }

    #[test]
    fn chains_closed_into_cycles_never_yield_batches(
        len in 2usize..8,
        extra in prop::collection::vec(any::<u32>(), 0..4)
    ) {
        // A ring of `len` units plus some acyclic bystanders.
        let mut yaml = String::from("units:\n");
        for i in 0..len {
            let dep = (i + 1) % len;
            yaml.push_str(&format!(
                "  - name: ring{i}\n    kind: service\n    depends_on: [ring{dep}]\n    start: [\"up\", \"ring{i}\"]\n    probe: {{tcp: \"localhost:{}\"}}\n",
                2000 + i,
            ));
        }
        for (i, _) in extra.iter().enumerate() {
            yaml.push_str(&format!(
                "  - name: free{i}\n    kind: service\n    start: [\"up\", \"free{i}\"]\n    probe: {{tcp: \"localhost:{}\"}}\n",
                3000 + i,
            ));
        }
        let manifest = Manifest::from_yaml(&yaml).expect("generated manifest should parse");
        let units: Vec<_> = manifest.units().collect();

        match graph::build(&units) {
            Err(GraphError::Cycle { members }) => {
                // Exactly the ring is reported as unresolved.
                prop_assert_eq!(members.len(), len);
                prop_assert!(members.iter().all(|m| m.as_str().starts_with("ring")));
            }
            other => prop_assert!(false, "expected cycle error, got {:?}", other),
        }
    }
}
