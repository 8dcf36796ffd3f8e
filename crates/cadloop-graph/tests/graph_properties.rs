use cadloop_graph::PartDependencyGraph;
use cadloop_plan::PlanItem;
use proptest::prelude::*;
use std::collections::HashSet;

/// Plan of `n` parts where part `i` may depend only on parts `< i`
fn acyclic_plan() -> impl Strategy<Value = Vec<PlanItem>> {
    (1..16usize).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..3), n)
            .prop_map(move |picks| {
                picks
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut item = PlanItem::new(format!("p{i}"));
                        if i > 0 {
                            for dep in deps {
                                let name = format!("p{}", dep.index(i));
                                if !item.dependencies.contains(&name) {
                                    item = item.depends_on(name);
                                }
                            }
                        }
                        item
                    })
                    .collect::<Vec<_>>()
            })
    })
}

/// Plan with arbitrary edges, cycles and dangling targets allowed
fn arbitrary_plan() -> impl Strategy<Value = Vec<PlanItem>> {
    proptest::collection::vec(proptest::collection::vec(0..12usize, 0..4), 1..12).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    deps.into_iter().fold(PlanItem::new(format!("p{i}")), |item, d| {
                        let name = format!("p{d}");
                        if item.dependencies.contains(&name) {
                            item
                        } else {
                            item.depends_on(name)
                        }
                    })
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn prop_acyclic_order_is_complete_and_respects_edges(plan in acyclic_plan()) {
        let graph = PartDependencyGraph::from_plan(&plan);
        let order = graph.topological_order();

        prop_assert!(graph.validate().is_empty());
        prop_assert_eq!(order.len(), plan.len());

        let position = |name: &str| order.iter().position(|n| n == name);
        for item in &plan {
            for dep in &item.dependencies {
                prop_assert!(position(dep.as_str()) < position(item.name.as_str()));
            }
        }
    }

    #[test]
    fn prop_backlinks_independent_of_plan_order(plan in acyclic_plan(), seed in any::<u64>()) {
        let mut shuffled = plan.clone();
        // deterministic permutation from the seed
        shuffled.sort_by_key(|item| {
            let mut h = seed;
            for b in item.name.bytes() {
                h = h.wrapping_mul(31).wrapping_add(u64::from(b));
            }
            h
        });

        let a = PartDependencyGraph::from_plan(&plan);
        let b = PartDependencyGraph::from_plan(&shuffled);

        for item in &plan {
            let left: HashSet<_> = a.get(&item.name).unwrap().dependents().iter().collect();
            let right: HashSet<_> = b.get(&item.name).unwrap().dependents().iter().collect();
            prop_assert_eq!(left, right);
        }
    }

    #[test]
    fn prop_affected_by_is_unique_and_excludes_start(plan in arbitrary_plan()) {
        let graph = PartDependencyGraph::from_plan(&plan);

        for item in &plan {
            let affected = graph.affected_by(&item.name);
            let unique: HashSet<_> = affected.iter().collect();
            prop_assert_eq!(unique.len(), affected.len());
            prop_assert!(!affected.contains(&item.name));
        }
    }

    #[test]
    fn prop_order_omits_exactly_what_cannot_be_scheduled(plan in arbitrary_plan()) {
        let graph = PartDependencyGraph::from_plan(&plan);
        let order = graph.topological_order();
        let has_cycle = graph.validate().iter().any(|i| i.is_cycle());

        prop_assert_eq!(order.len() == graph.len(), !has_cycle);
    }

    #[test]
    fn prop_remove_part_leaves_no_references(plan in arbitrary_plan(), pick in any::<prop::sample::Index>()) {
        let mut graph = PartDependencyGraph::from_plan(&plan);
        let victim = plan[pick.index(plan.len())].name.clone();

        prop_assert!(graph.remove_part(&victim).is_some());
        prop_assert!(!graph.contains(&victim));

        for part in graph.parts() {
            prop_assert!(!part.dependencies().contains(&victim));
            prop_assert!(!part.dependents().contains(&victim));
        }
        for name in graph.names() {
            prop_assert!(!graph.affected_by(name).contains(&victim));
        }
    }
}
