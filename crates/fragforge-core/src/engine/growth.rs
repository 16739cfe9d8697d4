use super::context::GaContext;
use super::error::EngineError;
use crate::core::library::fragment_space::BlockAp;
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::ids::{ApRef, VertexKey};
use crate::core::models::ring::ClosableChain;
use crate::core::models::symmetry::SymmetricSet;
use crate::core::models::vertex::BuildingBlockType;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{instrument, trace};

/// How [`extend_graph`] grows a vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthOptions {
    /// Keep extending every vertex added, depth first.
    pub recursive: bool,
    /// Substitute all APs symmetric to the chosen one, whatever the symmetry probability says.
    pub symmetric_on_aps: bool,
    /// Skip the probabilistic gates for the APs of the starting vertex.
    pub force: bool,
    /// Fragment AP to attach instead of a random compatible one.
    pub choice: Option<BlockAp>,
}

impl GrowthOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn forced(choice: Option<BlockAp>) -> Self {
        Self {
            force: true,
            choice,
            ..Self::default()
        }
    }

    pub fn with_symmetry(mut self, symmetric_on_aps: bool) -> Self {
        self.symmetric_on_aps = symmetric_on_aps;
        self
    }
}

/// Draws `true` with probability `p`, clamping `p` into `[0, 1]`.
pub(crate) fn chance(rng: &mut impl Rng, p: f64) -> bool {
    if p.is_nan() {
        return false;
    }
    rng.gen_bool(p.clamp(0.0, 1.0))
}

/// Grows new fragments on the free APs of `vertex`.
///
/// Free APs are visited in random order. Unless forced, each AP passes a growth gate whose
/// probability is the product of the size, level and crowding gates; an AP failing the gate
/// may still receive a ring-closing vertex when ring closures are enabled. A chosen fragment is
/// attached on the AP, on the APs symmetric to it, and on the same APs of the symmetric
/// siblings of `vertex`; copies attached together form a new symmetric set. Attachments that
/// would exceed the heavy-atom limit are skipped.
///
/// # Return
///
/// Returns `Ok(true)` if at least one vertex was added.
///
/// # Errors
///
/// Returns an error if `vertex` is not in `graph`, an edge cannot be created, or the chosen
/// fragment AP is not compatible with a free AP it is offered to.
#[instrument(level = "trace", skip_all, fields(recursive = options.recursive, force = options.force))]
pub fn extend_graph<R: Rng>(
    graph: &mut Graph,
    vertex: VertexKey,
    options: GrowthOptions,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<bool, EngineError> {
    let v = graph
        .vertex(vertex)
        .ok_or(GraphError::VertexNotFound(vertex))?;
    if !v.has_free_ap() {
        return Ok(false);
    }
    let level = graph.level(vertex).unwrap_or(-1);
    let mut ap_order: Vec<usize> = (0..v.aps.len()).collect();
    ap_order.shuffle(rng);

    let growth = &ctx.config.growth;
    let rings = &ctx.config.rings;
    let mut added: Vec<VertexKey> = Vec::new();

    for ap_index in ap_order {
        let ap = ApRef::new(vertex, ap_index);
        let Some(class) = graph
            .ap(ap)
            .filter(|a| a.is_free())
            .map(|a| a.class.clone())
        else {
            continue;
        };
        if graph.embedding().is_some_and(|e| e.is_projected(ap)) {
            continue;
        }

        let mut only_ring_closure = false;
        if !options.force {
            let level_p = growth.level_probability(level);
            let crowd_p = growth.crowding_probability(graph.crowdedness(ap));
            let p = growth.size_probability(graph.heavy_atom_count()) * level_p * crowd_p;
            if !chance(rng, p) {
                if rings.enabled && chance(rng, level_p * crowd_p) {
                    only_ring_closure = true;
                } else {
                    trace!(ap = ap_index, probability = p, "Growth gate rejected AP");
                    continue;
                }
            }
        }

        if !only_ring_closure && rings.enabled && rings.closable_chain_bias {
            if let Some(key) = attach_in_closable_chain(graph, ap, ctx, rng)? {
                added.push(key);
                continue;
            }
        }

        let chosen = if only_ring_closure {
            ctx.space.ring_closing_fragment_aps(&class).choose(rng).copied()
        } else if options.choice.is_some() {
            options.choice
        } else {
            ctx.space.compatible_fragment_aps(&class).choose(rng).copied()
        };
        let Some(chosen) = chosen else {
            trace!(ap = ap_index, class = %class, "No fragment fits AP");
            continue;
        };
        let Some(block) = ctx
            .space
            .building_block(BuildingBlockType::Fragment, chosen.building_block)
        else {
            continue;
        };
        if options.choice.is_some() && !only_ring_closure {
            let fits = block
                .attachment_points
                .get(chosen.ap_index)
                .is_some_and(|target| ctx.space.is_compatible(&class, &target.class));
            if !fits {
                return Err(EngineError::IncompatibleChoice {
                    vertex_id: graph.vertex(vertex).map_or(0, |v| v.id()),
                    index: ap_index,
                    building_block: chosen.building_block,
                    ap_index: chosen.ap_index,
                });
            }
        }
        let incoming = block.heavy_atoms;
        let current = graph.heavy_atom_count();
        if current + incoming > growth.max_heavy_atoms {
            continue;
        }

        let symmetric_substitution = ctx.space.imposes_symmetry(&class)
            || chance(rng, growth.symmetric_substitution_probability);
        let targets = substitution_targets(
            graph,
            ap,
            (symmetric_substitution || options.symmetric_on_aps) && !only_ring_closure,
            ctx,
            rng,
        );
        if current + incoming * targets.len() > growth.max_heavy_atoms {
            continue;
        }

        let order = ctx.space.bond_order(&class);
        let mut new_set = Vec::with_capacity(targets.len());
        for target in targets {
            let free = graph.ap(target).is_some_and(|a| a.is_free())
                && !graph.embedding().is_some_and(|e| e.is_projected(target));
            if !free {
                continue;
            }
            let Some(fresh) = ctx.space.instantiate(
                BuildingBlockType::Fragment,
                chosen.building_block,
                ctx.ids.next_vertex_id(),
            ) else {
                continue;
            };
            new_set.push(graph.append_vertex_on_ap(target, fresh, chosen.ap_index, order)?);
        }
        if new_set.len() > 1 {
            graph.add_symmetric_set(SymmetricSet::new(new_set.clone()));
        }
        added.extend(new_set);
    }

    if options.recursive {
        let child_options = GrowthOptions {
            force: false,
            choice: None,
            ..options
        };
        for &key in &added {
            if graph.contains_vertex(key) {
                extend_graph(graph, key, child_options, ctx, rng)?;
            }
        }
    }
    Ok(!added.is_empty())
}

/// APs receiving a copy of the fragment chosen for `ap`.
///
/// With symmetry, the group of APs symmetric to `ap` is used. When the whole group sits on
/// one atom, members after the first are added one by one while a single draw stays under the
/// crowding probability of the growing atom. The same APs on the symmetric siblings of the
/// owner are added when they are identical to the originals.
fn substitution_targets<R: Rng>(
    graph: &Graph,
    ap: ApRef,
    symmetric: bool,
    ctx: &GaContext,
    rng: &mut R,
) -> Vec<ApRef> {
    let Some(v) = graph.vertex(ap.vertex) else {
        return Vec::new();
    };
    let group = match v.symmetric_aps_of(ap.index) {
        Some(group) if symmetric => group.to_vec(),
        _ => vec![ap.index],
    };
    let atom = v.aps[ap.index].source_atom;
    let on_one_atom = group
        .iter()
        .all(|&i| v.ap(i).is_some_and(|a| a.source_atom == atom));

    let indices: Vec<usize> = if group.len() > 1 && on_one_atom {
        let growth = &ctx.config.growth;
        let mut crowdedness = graph.crowdedness(ap) + 1;
        let shot: f64 = rng.gen_range(0.0..1.0);
        let mut kept = vec![ap.index];
        for &other in group.iter().filter(|&&i| i != ap.index) {
            if shot > growth.crowding_probability(crowdedness) {
                break;
            }
            kept.push(other);
            crowdedness += 1;
        }
        kept
    } else {
        group
    };

    let mut targets: Vec<ApRef> = indices.iter().map(|&i| ApRef::new(ap.vertex, i)).collect();
    for sibling in graph.symmetric_siblings(ap.vertex) {
        if sibling == ap.vertex {
            continue;
        }
        for &i in &indices {
            let candidate = ApRef::new(sibling, i);
            let identical = graph
                .ap(candidate)
                .zip(v.ap(i))
                .is_some_and(|(a, b)| a.same_as(b));
            if identical && !targets.contains(&candidate) {
                targets.push(candidate);
            }
        }
    }
    targets
}

/// The block a closable chain puts next to a vertex, and the AP it bonds through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NextLink {
    building_block: usize,
    kind: BuildingBlockType,
    ap_index: usize,
}

/// Finds the link following the vertex `(building_block, kind)` in `chain`, leaving through
/// AP `ap_index`.
///
/// The root vertex sits on the turning point; any other vertex must match a link whose APs
/// towards the chain ends are the AP to its parent and `ap_index`.
fn next_link(
    chain: &ClosableChain,
    building_block: usize,
    kind: BuildingBlockType,
    towards_parent: Option<usize>,
    ap_index: usize,
) -> Option<NextLink> {
    let position = chain.links.iter().enumerate().position(|(i, link)| {
        link.building_block == building_block
            && link.kind == kind
            && match towards_parent {
                None => i == chain.turning_point,
                Some(p) => {
                    (link.ap_to_left == Some(p) && link.ap_to_right == Some(ap_index))
                        || (link.ap_to_right == Some(p) && link.ap_to_left == Some(ap_index))
                }
            }
    })?;
    let link = &chain.links[position];
    let (neighbour, neighbour_ap) = if link.ap_to_right == Some(ap_index) {
        let n = chain.links.get(position + 1)?;
        (n, n.ap_to_left?)
    } else if link.ap_to_left == Some(ap_index) && position > 0 {
        let n = &chain.links[position - 1];
        (n, n.ap_to_right?)
    } else {
        return None;
    };
    Some(NextLink {
        building_block: neighbour.building_block,
        kind: neighbour.kind,
        ap_index: neighbour_ap,
    })
}

/// Attaches on `ap` the block some closable chain of the graph expects there.
///
/// Chains are grouped by the block they suggest and one group is drawn at random; afterwards
/// the graph only keeps the chains of that group.
fn attach_in_closable_chain<R: Rng>(
    graph: &mut Graph,
    ap: ApRef,
    ctx: &GaContext,
    rng: &mut R,
) -> Result<Option<VertexKey>, EngineError> {
    if graph.closable_chains().is_empty() {
        return Ok(None);
    }
    let Some(v) = graph.vertex(ap.vertex) else {
        return Ok(None);
    };
    let Some(class) = v.ap(ap.index).map(|a| a.class.clone()) else {
        return Ok(None);
    };
    let towards_parent = graph
        .parent_edge(ap.vertex)
        .and_then(|e| graph.edge(e))
        .map(|e| e.target.index);

    let mut groups: Vec<(NextLink, Vec<usize>)> = Vec::new();
    for (i, chain) in graph.closable_chains().iter().enumerate() {
        let Some(next) = next_link(chain, v.building_block_id, v.kind, towards_parent, ap.index)
        else {
            continue;
        };
        match groups.iter_mut().find(|(n, _)| *n == next) {
            Some((_, members)) => members.push(i),
            None => groups.push((next, vec![i])),
        }
    }
    let Some((next, members)) = groups.choose(rng).cloned() else {
        return Ok(None);
    };

    let Some(fresh) = ctx
        .space
        .instantiate(next.kind, next.building_block, ctx.ids.next_vertex_id())
    else {
        return Ok(None);
    };
    let fits = fresh
        .ap(next.ap_index)
        .is_some_and(|a| ctx.space.is_compatible(&class, &a.class));
    if !fits || graph.heavy_atom_count() + fresh.heavy_atoms > ctx.config.growth.max_heavy_atoms {
        return Ok(None);
    }
    let key = graph.append_vertex_on_ap(ap, fresh, next.ap_index, ctx.space.bond_order(&class))?;
    let kept = members
        .iter()
        .filter_map(|&i| graph.closable_chains().get(i).cloned())
        .collect();
    graph.set_closable_chains(kept);
    trace!(building_block = next.building_block, "Attached block of a closable chain");
    Ok(Some(key))
}

/// Builds a new graph from a random scaffold, grown recursively.
///
/// # Return
///
/// Returns `Ok(None)` if the library has no scaffold or nothing could be grown on it.
pub fn grow_from_scaffold<R: Rng>(ctx: &GaContext, rng: &mut R) -> Result<Option<Graph>, EngineError> {
    let Some(scaffold) = ctx.space.random_scaffold(rng) else {
        return Ok(None);
    };
    let Some(root) = ctx
        .space
        .instantiate(BuildingBlockType::Scaffold, scaffold, ctx.ids.next_vertex_id())
    else {
        return Ok(None);
    };
    let mut graph = Graph::with_id(ctx.ids.next_graph_id());
    let has_aps = !root.aps.is_empty();
    let key = graph.add_vertex(root);
    if ctx.config.rings.enabled && ctx.config.rings.closable_chain_bias {
        graph.set_closable_chains(ctx.archive.chains_for(scaffold).to_vec());
    }
    let grew = extend_graph(&mut graph, key, GrowthOptions::recursive(), ctx, rng)?;
    if has_aps && !grew {
        return Ok(None);
    }
    Ok(Some(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::fragment_space::FragmentSpace;
    use crate::core::library::test_utils::*;
    use crate::core::models::ids::IdGenerator;
    use crate::core::models::ring::ChainLink;
    use crate::engine::config::{GrowthGate, GrowthScheme, RingClosureConfig};
    use crate::engine::context::test_utils::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    mod symmetry {
        use super::*;

        #[test]
        fn imposed_symmetry_fills_the_whole_ap_group() {
            let space = FragmentSpace::parse(
                &TEST_LIBRARY.replace(
                    r#"forbidden-ends = ["X:0"]"#,
                    "forbidden-ends = [\"X:0\"]\nsymmetric-classes = [\"A:0\"]",
                ),
                "inline",
            )
            .unwrap();
            let harness = Harness::with_space(space, default_config());
            let ctx = harness.ctx();
            let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 0);

            let choice = Some(BlockAp {
                building_block: END,
                ap_index: 0,
            });
            let grew = extend_graph(&mut g, s, GrowthOptions::forced(choice), &ctx, &mut rng(3)).unwrap();

            assert!(grew);
            assert_eq!(g.vertex_count(), 4);
            assert_eq!(g.symmetric_sets().len(), 1);
            assert_eq!(g.symmetric_sets()[0].len(), 3);
            assert!(g.check_consistency().is_ok());
        }

        #[test]
        fn without_symmetry_only_one_ap_per_choice_is_used() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 0);
            let choice = Some(BlockAp {
                building_block: END,
                ap_index: 0,
            });
            extend_graph(&mut g, s, GrowthOptions::forced(choice), &ctx, &mut rng(5)).unwrap();
            assert_eq!(g.vertex_count(), 4);
            assert!(g.symmetric_sets().is_empty());
        }

        #[test]
        fn symmetric_siblings_grow_together() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 0);
            let branches: Vec<VertexKey> = (0..3)
                .map(|i| attach(&mut g, &harness.space, &harness.ids, ApRef::new(s, i), BRANCH))
                .collect();
            g.add_symmetric_set(SymmetricSet::new(branches.clone()));

            let choice = Some(BlockAp {
                building_block: END,
                ap_index: 0,
            });
            let options = GrowthOptions::forced(choice).with_symmetry(true);
            extend_graph(&mut g, branches[0], options, &ctx, &mut rng(9)).unwrap();

            for b in branches {
                assert_eq!(g.children(b).len(), 2);
            }
            assert!(g.check_consistency().is_ok());
        }
    }

    mod limits {
        use super::*;

        #[test]
        fn recursive_growth_respects_heavy_atom_limit() {
            let harness = Harness::new(config_with(unrestricted_growth(12), RingClosureConfig::default()));
            let ctx = harness.ctx();
            for seed in 0..10 {
                let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 1);
                extend_graph(&mut g, s, GrowthOptions::recursive(), &ctx, &mut rng(seed)).unwrap();
                assert!(g.heavy_atom_count() <= 12);
                assert!(g.vertex_count() > 1);
                assert!(g.check_consistency().is_ok());
            }
        }

        #[test]
        fn steep_level_gate_stops_growth_below_first_level() {
            let mut growth = unrestricted_growth(1000);
            growth.level_gate = Some(GrowthGate::new(GrowthScheme::Tanh, 50.0, 1.0, 2.5));
            let harness = Harness::new(config_with(growth, RingClosureConfig::default()));
            let ctx = harness.ctx();
            for seed in 0..5 {
                let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 0);
                extend_graph(&mut g, s, GrowthOptions::recursive(), &ctx, &mut rng(seed)).unwrap();
                assert!(g.vertex_keys().iter().all(|&k| g.level(k).unwrap() <= 1));
            }
        }

        #[test]
        fn vertex_without_free_aps_does_not_grow() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, keys) = symmetric_graph(&harness.space, &harness.ids);
            let grew = extend_graph(&mut g, keys[1], GrowthOptions::forced(None), &ctx, &mut rng(1)).unwrap();
            assert!(!grew);
        }

        #[test]
        fn missing_vertex_is_an_error() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, keys) = linear_graph(&harness.space, &harness.ids, 1);
            g.remove_vertex(keys[1]);
            assert!(extend_graph(&mut g, keys[1], GrowthOptions::default(), &ctx, &mut rng(1)).is_err());
        }

        #[test]
        fn incompatible_choice_is_rejected() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 1);
            let choice = Some(BlockAp {
                building_block: LINKER,
                ap_index: 1,
            });
            assert!(matches!(
                extend_graph(&mut g, s, GrowthOptions::forced(choice), &ctx, &mut rng(2)),
                Err(EngineError::IncompatibleChoice { ap_index: 1, .. })
            ));
            assert_eq!(g.vertex_count(), 1);
        }

        #[test]
        fn choice_with_missing_ap_is_rejected() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let (mut g, s) = scaffold_graph(&harness.space, &harness.ids, 1);
            let choice = Some(BlockAp {
                building_block: END,
                ap_index: 4,
            });
            assert!(matches!(
                extend_graph(&mut g, s, GrowthOptions::forced(choice), &ctx, &mut rng(2)),
                Err(EngineError::IncompatibleChoice { .. })
            ));
        }
    }

    mod closable_chains {
        use super::*;

        fn link(bb: usize, kind: BuildingBlockType, left: Option<usize>, right: Option<usize>) -> ChainLink {
            ChainLink {
                building_block: bb,
                kind,
                ap_to_left: left,
                ap_to_right: right,
            }
        }

        fn chain() -> ClosableChain {
            ClosableChain {
                links: vec![
                    link(RCV, BuildingBlockType::Fragment, None, Some(0)),
                    link(1, BuildingBlockType::Scaffold, Some(1), Some(0)),
                    link(LINKER, BuildingBlockType::Fragment, Some(0), Some(1)),
                    link(RCV, BuildingBlockType::Fragment, Some(0), None),
                ],
                turning_point: 1,
            }
        }

        #[test]
        fn next_link_walks_both_directions() {
            let c = chain();
            let right = next_link(&c, 1, BuildingBlockType::Scaffold, None, 0).unwrap();
            assert_eq!((right.building_block, right.ap_index), (LINKER, 0));
            let left = next_link(&c, 1, BuildingBlockType::Scaffold, None, 1).unwrap();
            assert_eq!((left.building_block, left.ap_index), (RCV, 0));
            let after_linker = next_link(&c, LINKER, BuildingBlockType::Fragment, Some(0), 1).unwrap();
            assert_eq!(after_linker.building_block, RCV);
            assert!(next_link(&c, END, BuildingBlockType::Fragment, Some(0), 1).is_none());
        }

        #[test]
        fn biased_growth_follows_the_chain() {
            let rings = RingClosureConfig {
                enabled: true,
                closable_chain_bias: true,
                ..RingClosureConfig::default()
            };
            let harness = Harness::new(config_with(unrestricted_growth(100), rings));
            let ctx = harness.ctx();
            let ids = IdGenerator::new();
            let (mut g, s) = scaffold_graph(&harness.space, &ids, 1);
            g.set_closable_chains(vec![chain()]);

            extend_graph(&mut g, s, GrowthOptions::recursive(), &ctx, &mut rng(17)).unwrap();

            assert_eq!(g.vertex_count(), 4);
            let rcvs = g.vertices().filter(|(_, v)| v.is_ring_closing()).count();
            assert_eq!(rcvs, 2);
            assert!(g.check_consistency().is_ok());
        }
    }

    #[test]
    fn grow_from_scaffold_builds_a_consistent_graph() {
        let harness = Harness::new(default_config());
        let ctx = harness.ctx();
        for seed in 0..5 {
            let g = grow_from_scaffold(&ctx, &mut rng(seed)).unwrap().unwrap();
            assert!(g.vertex_count() > 1);
            assert_eq!(g.vertex(g.root().unwrap()).unwrap().kind(), BuildingBlockType::Scaffold);
            assert!(g.heavy_atom_count() <= 40);
            assert!(g.check_consistency().is_ok());
        }
    }
}
