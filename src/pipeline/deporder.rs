// src/pipeline/deporder.rs

//! `requires:` ordering for bundles.
//!
//! A script can declare what has to precede it in the bundle with a comment:
//!
//! ```text
//! // requires: lib/util.js, vendor.js
//! /* requires: polyfill.js */
//! ```
//!
//! A requirement matches an input whose relative path equals it or ends
//! with `/<requirement>`. Unknown requirements are ignored. Inputs keep
//! their selector order unless a requirement forces otherwise; a cycle
//! falls back to selector order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::LazyLock;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use tracing::{debug, warn};

use crate::step::Asset;
use crate::task::selector::to_slash;

static REQUIRES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?://+|/\*+|\*+)\s*requires:?\s+(?P<names>[^*\n]+?)\s*(?:\*/)?\s*$")
        .unwrap_or_else(|e| panic!("invalid requires regex: {e}"))
});

/// Names listed in `requires:` comments of `text`, in order of appearance.
pub fn parse_requires(text: &str) -> Vec<String> {
    REQUIRES
        .captures_iter(text)
        .flat_map(|caps| {
            caps["names"]
                .split([',', ' '])
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn satisfies(asset: &Asset, requirement: &str) -> bool {
    let rel = to_slash(&asset.rel);
    let requirement = requirement.trim_start_matches("./");
    rel == requirement || rel.ends_with(&format!("/{requirement}"))
}

/// Reorder `assets` (given in selector order) so that every asset comes
/// after the assets it requires.
pub fn order_by_requires(assets: Vec<Asset>) -> Vec<Asset> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..assets.len()).map(|i| graph.add_node(i)).collect();

    for (i, asset) in assets.iter().enumerate() {
        for requirement in parse_requires(&asset.text()) {
            let found = assets
                .iter()
                .enumerate()
                .find(|(j, other)| *j != i && satisfies(other, &requirement));
            match found {
                Some((j, _)) => {
                    graph.update_edge(nodes[j], nodes[i], ());
                }
                None => debug!(
                    asset = %asset.rel.display(),
                    requirement = %requirement,
                    "requirement matches no bundle input; ignoring"
                ),
            }
        }
    }

    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(assets.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for next in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
            let j = graph[next];
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }

    if order.len() < assets.len() {
        warn!("cyclic `requires:` comments in bundle; keeping path order");
        return assets;
    }

    let mut slots: Vec<Option<Asset>> = assets.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(rel: &str, text: &str) -> Asset {
        Asset::new(format!("/p/js/{rel}"), rel, text.as_bytes().to_vec())
    }

    fn rels(assets: &[Asset]) -> Vec<String> {
        assets.iter().map(|a| to_slash(&a.rel)).collect()
    }

    #[test]
    fn parses_line_and_block_comments() {
        let text = "// requires: lib/util.js, vendor.js\n/* requires: polyfill.js */\nvar x;";
        assert_eq!(
            parse_requires(text),
            vec!["lib/util.js", "vendor.js", "polyfill.js"]
        );
    }

    #[test]
    fn required_inputs_move_first() {
        let ordered = order_by_requires(vec![
            asset("app.js", "// requires: lib/util.js\napp()"),
            asset("lib/util.js", "function util() {}"),
            asset("main.js", "main()"),
        ]);
        assert_eq!(rels(&ordered), vec!["lib/util.js", "app.js", "main.js"]);
    }

    #[test]
    fn cycle_keeps_path_order() {
        let ordered = order_by_requires(vec![
            asset("a.js", "// requires: b.js"),
            asset("b.js", "// requires: a.js"),
        ]);
        assert_eq!(rels(&ordered), vec!["a.js", "b.js"]);
    }
}
