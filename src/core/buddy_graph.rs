use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::core::aliases::AliasMap;
use crate::core::bucketer::{chunk_in_order, chunk_label};
use crate::core::emails::{parse_buddy_requests, request_key};
use crate::models::{Bucket, BucketKind, Participant};

/// Union-find with path compression and union by rank
#[derive(Debug, Clone)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Counters gathered while building the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub malformed_tokens: usize,
    pub unknown_references: usize,
    /// Requester ids whose request set repeated an earlier requester's
    pub deduplicated_requests: Vec<String>,
}

/// Undirected "wants to be grouped with" graph over roster positions
///
/// Participants sharing a canonical email are the same node and always linked.
/// A one-directional request is enough to create an edge.
#[derive(Debug, Clone)]
pub struct BuddyGraph {
    adjacency: Vec<BTreeSet<usize>>,
    stats: GraphStats,
}

impl BuddyGraph {
    pub fn build(
        participants: &[Participant],
        aliases: &AliasMap,
        dedupe_request_keys: bool,
    ) -> Self {
        let mut graph = Self {
            adjacency: vec![BTreeSet::new(); participants.len()],
            stats: GraphStats::default(),
        };

        let mut by_email: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, p) in participants.iter().enumerate() {
            let email = aliases.resolve(&p.email);
            if !email.is_empty() {
                by_email.entry(email).or_default().push(i);
            }
        }

        for holders in by_email.values() {
            for pair in holders.windows(2) {
                graph.link(pair[0], pair[1]);
            }
        }

        let mut seen_keys: HashSet<String> = HashSet::new();
        for (i, p) in participants.iter().enumerate() {
            let parsed = parse_buddy_requests(&p.raw_buddy_requests);
            graph.stats.malformed_tokens += parsed.malformed;

            let own = aliases.resolve(&p.email);
            let requested: BTreeSet<String> = parsed
                .emails
                .iter()
                .map(|e| aliases.resolve(e))
                .filter(|e| *e != own)
                .collect();
            if requested.is_empty() {
                continue;
            }

            if dedupe_request_keys && !seen_keys.insert(request_key(&requested)) {
                tracing::warn!(
                    "Participant {} repeats an earlier request set ({}); request dropped",
                    p.id,
                    request_key(&requested)
                );
                graph.stats.deduplicated_requests.push(p.id.clone());
                continue;
            }

            for email in &requested {
                match by_email.get(email) {
                    Some(targets) => {
                        for &j in targets {
                            if j != i {
                                graph.link(i, j);
                            }
                        }
                    }
                    None => {
                        tracing::debug!(
                            "Participant {} requested {} who is not on the roster",
                            p.id,
                            email
                        );
                        graph.stats.unknown_references += 1;
                    }
                }
            }
        }

        graph
    }

    fn link(&mut self, a: usize, b: usize) {
        self.adjacency[a].insert(b);
        self.adjacency[b].insert(a);
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[node].iter().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Connected components, members ascending, ordered by their first member
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.len()];
        let mut components = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..self.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);
            let mut component = Vec::new();

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for next in self.neighbors(node) {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

/// Requested groups plus the participants left for later stages
#[derive(Debug, Clone)]
pub struct Resolution {
    pub groups: Vec<Bucket>,
    pub remaining: Vec<Participant>,
    pub stats: GraphStats,
}

/// Turn every component of two or more into capacity-bounded Requested Groups
///
/// Singleton components go back to the pool untouched, in roster order.
pub fn resolve_requested_groups(
    participants: Vec<Participant>,
    aliases: &AliasMap,
    capacity: usize,
    dedupe_request_keys: bool,
) -> Resolution {
    let graph = BuddyGraph::build(&participants, aliases, dedupe_request_keys);
    let components = graph.components();

    let mut slots: Vec<Option<Participant>> = participants.into_iter().map(Some).collect();
    let mut groups = Vec::new();
    let mut component_number = 0;

    for component in components.iter().filter(|c| c.len() >= 2) {
        component_number += 1;
        let members: Vec<Participant> = component.iter().filter_map(|&i| slots[i].take()).collect();
        let origin = format!("request-{}", component_number);
        let base = format!("Requested Group {}", component_number);

        let chunks = chunk_in_order(members, capacity);
        let total = chunks.len();
        for (k, chunk) in chunks.into_iter().enumerate() {
            let label = chunk_label(&base, k + 1, total);
            groups.push(
                Bucket::new(BucketKind::Requested, label, capacity, chunk)
                    .with_origin(origin.clone()),
            );
        }
    }

    let remaining: Vec<Participant> = slots.into_iter().flatten().collect();

    tracing::info!(
        "Buddy graph: {} edges, {} requested components, {} groups, {} left in pool",
        graph.edge_count(),
        component_number,
        groups.len(),
        remaining.len()
    );

    Resolution {
        groups,
        remaining,
        stats: graph.stats().clone(),
    }
}
