//! Weighted maximum-cardinality maximum-weight matching on a general
//! (non-bipartite) graph: a primal-dual ("Hungarian tree" + blossom
//! contraction) implementation of Edmonds' algorithm.
//!
//! Edge weights are [`BigWeight`]s; a weight of zero means "no edge", not a
//! real edge worth zero. The solver is a pure function of its edge table:
//! [`MatchingSolver::compute`] always restarts the primal-dual search from
//! scratch rather than reusing duals from a previous call, since callers
//! mutate edge weights between every solve.

use crate::bigweight::BigWeight;

/// A vertex with no matching edges or mate of itself denotes "unmatched".
const NONE: usize = 0;

/// Weighted general-graph matcher. Vertices are numbered `1..=n`; index 0
/// is reserved as the "no vertex" sentinel so that plain `usize` can double
/// as an `Option<vertex>`.
pub struct MatchingSolver {
    n: usize,
    width: u32,
    weight: Vec<Vec<BigWeight>>,
    mate: Vec<usize>,
}

impl MatchingSolver {
    /// Preallocate a solver for up to `v_max` vertices with edge weights
    /// declared at `w_max` bits wide.
    pub fn new(v_max: usize, w_max: u32) -> Self {
        Self {
            n: 0,
            width: w_max,
            weight: vec![vec![BigWeight::zero(w_max); v_max + 1]; v_max + 1],
            mate: vec![NONE; v_max + 1],
        }
    }

    /// Append one vertex, returning its 1-based index.
    pub fn add_vertex(&mut self) -> usize {
        self.n += 1;
        debug_assert!(self.n < self.weight.len(), "MatchingSolver over capacity");
        self.n
    }

    /// Set the weight of edge `{i, j}`. A weight of zero removes the edge.
    pub fn set_edge_weight(&mut self, i: usize, j: usize, w: BigWeight) {
        debug_assert_ne!(i, j);
        self.weight[i][j] = w.clone();
        self.weight[j][i] = w;
    }

    /// The partner of `i` in the last computed matching, or `i` itself if
    /// `i` is unmatched.
    pub fn mate(&self, i: usize) -> usize {
        let m = self.mate[i];
        if m == NONE { i } else { m }
    }

    /// Recompute the optimal matching. Must be called after any sequence
    /// of `set_edge_weight` calls before `mate` is read.
    pub fn compute(&mut self) {
        let n = self.n;
        if n == 0 {
            return;
        }
        let mut solver = BlossomSearch::new(n, self.width, &self.weight);
        solver.run();
        self.mate[..=n].copy_from_slice(&solver.match_[..=n]);
    }
}

/// Scratch state for one full primal-dual run. `m` is the id space for
/// blossoms: original vertices occupy `1..=n`, blossoms occupy `n+1..=m`.
struct BlossomSearch<'a> {
    n: usize,
    m: usize,
    cost: Vec<Vec<BigWeight>>,
    lab: Vec<BigWeight>,
    match_: Vec<usize>,
    slack: Vec<usize>,
    st: Vec<usize>,
    pa: Vec<usize>,
    flower: Vec<Vec<usize>>,
    flower_from: Vec<Vec<usize>>,
    mark: Vec<u8>,
    vis: Vec<bool>,
    queue: std::collections::VecDeque<usize>,
    next_blossom: usize,
    width: u32,
    _weight: &'a [Vec<BigWeight>],
}

const EVEN: u8 = 1;
const ODD: u8 = 2;

impl<'a> BlossomSearch<'a> {
    fn new(n: usize, width: u32, weight: &'a [Vec<BigWeight>]) -> Self {
        let m = 2 * n;
        // Doubling every weight keeps blossom duals (which are naturally
        // half-integers) integral throughout.
        let mut cost = vec![vec![BigWeight::zero(width + 1); n + 1]; n + 1];
        for u in 1..=n {
            for v in 1..=n {
                if u == v {
                    continue;
                }
                let mut w2 = weight[u][v].clone();
                w2.shift_left_grow(1);
                cost[u][v] = w2;
            }
        }
        let mut lab = vec![BigWeight::zero(width + 1); m + 1];
        for v in 1..=n {
            let mut best = BigWeight::zero(width + 1);
            for u in 1..=n {
                if u != v && cost[v][u] > best {
                    best = cost[v][u].clone();
                }
            }
            lab[v] = best;
        }
        Self {
            n,
            m,
            cost,
            lab,
            match_: vec![NONE; m + 1],
            slack: vec![NONE; m + 1],
            st: (0..=m).collect(),
            pa: vec![NONE; m + 1],
            flower: vec![Vec::new(); m + 1],
            flower_from: vec![Vec::new(); m + 1],
            mark: vec![0; m + 1],
            vis: vec![false; m + 1],
            queue: std::collections::VecDeque::new(),
            next_blossom: n,
            width,
            _weight: weight,
        }
    }

    fn e_delta(&self, u: usize, v: usize) -> BigWeight {
        let mut d = self.lab[u].clone();
        d.add(&self.lab[v]);
        d.sub(&self.cost[u][v]);
        d
    }

    fn update_slack(&mut self, u: usize, v: usize) {
        if self.slack[v] == NONE || self.e_delta(u, v) < self.e_delta(self.slack[v], v) {
            self.slack[v] = u;
        }
    }

    fn calc_slack(&mut self, v: usize) {
        self.slack[v] = NONE;
        for u in 1..=self.n {
            if !self.cost[u][v].is_zero() && self.st[u] != v && self.mark[self.st[u]] == EVEN {
                self.update_slack(u, v);
            }
        }
    }

    fn q_push(&mut self, v: usize) {
        if v <= self.n {
            self.queue.push_back(v);
        } else {
            let members = self.flower[v].clone();
            for x in members {
                self.q_push(x);
            }
        }
    }

    fn set_st(&mut self, v: usize, b: usize) {
        self.st[v] = b;
        if v > self.n {
            let members = self.flower[v].clone();
            for x in members {
                self.set_st(x, b);
            }
        }
    }

    fn get_pr(&mut self, b: usize, xr: usize) -> usize {
        let pr = self.flower[b].iter().position(|&x| x == xr).unwrap();
        if pr % 2 == 1 {
            self.flower[b][1..].reverse();
            self.flower[b].len() - pr
        } else {
            pr
        }
    }

    fn set_match(&mut self, u: usize, v: usize) {
        self.match_[u] = v;
        if u > self.n {
            let xr = self.flower_from[u][v];
            let pr = self.get_pr(u, xr);
            for i in 0..pr {
                let a = self.flower[u][i];
                let b = self.flower[u][i ^ 1];
                self.set_match(a, b);
            }
            self.set_match(xr, v);
            self.flower[u].rotate_left(pr);
        }
    }

    fn augment(&mut self, u: usize, v: usize) {
        let xnv = self.st[self.match_[u]];
        self.set_match(u, v);
        if xnv == NONE {
            return;
        }
        let parent = self.st[self.pa[xnv]];
        self.set_match(xnv, parent);
        self.augment(parent, xnv);
    }

    fn path_to_root(&self, mut v: usize) -> Vec<usize> {
        let mut path = vec![];
        loop {
            v = self.st[v];
            path.push(v);
            if self.match_[v] == NONE {
                return path;
            }
            v = self.st[self.pa[self.match_[v]]];
        }
    }

    fn lca(&self, u: usize, v: usize) -> usize {
        // Walk both roots-to-node paths; since both converge at the tree
        // root, the last common entry is the lowest common ancestor.
        let path_u = self.path_to_root(u);
        let path_v = self.path_to_root(v);
        for a in path_u.iter().rev() {
            if path_v.contains(a) {
                return *a;
            }
        }
        unreachable!("alternating tree paths always share the root")
    }

    fn add_blossom(&mut self, u: usize, lca: usize, v: usize) {
        self.next_blossom += 1;
        let b = self.next_blossom;
        self.st[b] = b;
        self.pa[b] = NONE;
        self.mark[b] = 0;
        self.match_[b] = self.match_[lca];

        let mut petals = vec![];
        let mut from = vec![NONE; self.m + 1];

        let mut x = u;
        while self.st[x] != lca {
            petals.push(self.st[x]);
            let y = self.st[self.match_[x]];
            petals.push(y);
            self.q_push(y);
            x = self.st[self.pa[y]];
        }
        petals.push(lca);
        petals.reverse();

        let mut x = v;
        while self.st[x] != lca {
            petals.push(self.st[x]);
            let y = self.st[self.match_[x]];
            petals.push(y);
            self.q_push(y);
            x = self.st[self.pa[y]];
        }

        for &p in &petals {
            from[p] = p;
        }
        self.flower[b] = petals;
        self.flower_from[b] = from;

        for i in 1..=self.n {
            if self.flower[b].iter().any(|&p| self.st[i] == p) {
                self.set_st(i, b);
            }
        }
        for &p in self.flower[b].clone().iter() {
            let is_even = self.mark[p] == EVEN;
            if !is_even {
                self.mark[p] = ODD;
                self.mark[b] = EVEN;
            }
        }
        self.mark[b] = EVEN;
        self.lab[b] = BigWeight::zero(self.width + 1);
        self.calc_slack(b);
        self.q_push(b);
    }

    fn expand_blossom(&mut self, b: usize) {
        for &x in self.flower[b].clone().iter() {
            self.set_st(x, x);
        }
        let xr = self.flower_from[b][self.match_[b]];
        let pr = self.get_pr(b, xr);

        let mut i = 0usize;
        while i < pr {
            let a = self.flower[b][i];
            let next = self.flower[b][(i + 1) % self.flower[b].len()];
            let bb = self.flower[b][i + 1];
            self.pa[a] = next;
            self.mark[a] = ODD;
            self.mark[bb] = EVEN;
            self.calc_slack(bb);
            self.q_push(bb);
            i += 2;
        }
        self.mark[xr] = ODD;
        self.pa[xr] = self.pa[b];
        let mut i = pr + 1;
        while i < self.flower[b].len() {
            let v = self.flower[b][i];
            self.mark[v] = 0;
            i += 1;
        }
        self.st[b] = b;
    }

    fn on_found_edge(&mut self, u: usize, v: usize) -> bool {
        let su = self.st[u];
        let sv = self.st[v];
        if self.mark[sv] == 0 {
            self.pa[sv] = u;
            self.mark[sv] = ODD;
            let matched = self.match_[sv];
            self.mark[self.st[matched]] = EVEN;
            self.calc_slack(self.st[matched]);
            self.q_push(self.st[matched]);
        } else if self.mark[sv] == EVEN {
            let l = self.lca(su, sv);
            if l != su && l != sv {
                self.add_blossom(u, l, v);
            } else {
                return true; // augmenting path found through this bridge
            }
        }
        false
    }

    fn matching_bfs(&mut self) -> bool {
        self.vis.iter_mut().for_each(|v| *v = false);
        self.queue.clear();
        for v in 1..=self.m {
            self.mark[v] = 0;
        }
        for v in 1..=self.n {
            if self.st[v] == v && self.match_[v] == NONE {
                self.pa[v] = NONE;
                self.mark[v] = EVEN;
                self.q_push(v);
            }
        }
        if self.queue.is_empty() {
            return true; // everyone already matched
        }
        loop {
            while let Some(u) = self.queue.pop_front() {
                if self.st[u] != u || self.mark[u] != EVEN {
                    continue;
                }
                for v in 1..=self.n {
                    if self.cost[u][v].is_zero() || self.st[u] == self.st[v] {
                        continue;
                    }
                    if self.e_delta(u, v).is_zero() {
                        if self.on_found_edge(u, v) {
                            self.augment_from(u, v);
                            return false;
                        }
                    } else {
                        self.update_slack(u, self.st[v]);
                    }
                }
            }
            if !self.update_labels() {
                return true; // no more progress possible for this phase
            }
        }
    }

    fn augment_from(&mut self, u: usize, v: usize) {
        self.augment(u, v);
        self.augment(v, u);
    }

    /// Raise/lower dual labels by the minimum slack that would either
    /// tighten a new crossing edge or allow a fully-tight blossom to
    /// dissolve, then resume the same BFS instead of restarting it.
    fn update_labels(&mut self) -> bool {
        let mut delta: Option<BigWeight> = None;
        for b in 1..=self.m {
            if self.st[b] == b && self.mark[b] == ODD {
                // Odd blossoms that reach zero dual must expand; their
                // own contribution to delta is their current label.
                let candidate = self.lab[b].clone();
                if delta.as_ref().is_none_or(|d| candidate < *d) {
                    delta = Some(candidate);
                }
            }
        }
        for v in 1..=self.n {
            if self.st[v] == v && self.mark[self.st[v]] == 0 && self.slack[v] != NONE {
                let d = self.e_delta(self.slack[v], v);
                if delta.as_ref().is_none_or(|cur| d < *cur) {
                    delta = Some(d);
                }
            }
        }
        let Some(delta) = delta else {
            return false;
        };
        if delta.is_zero() {
            return false;
        }
        for v in 1..=self.n {
            match self.mark[self.st[v]] {
                EVEN => self.lab[v].add(&delta),
                ODD => self.lab[v].sub(&delta),
                _ => {}
            }
        }
        for b in self.n + 1..=self.next_blossom {
            if self.st[b] == b {
                match self.mark[b] {
                    EVEN => self.lab[b].add(&delta),
                    ODD => self.lab[b].sub(&delta),
                    _ => {}
                }
            }
        }
        for b in self.n + 1..=self.next_blossom {
            if self.st[b] == b && self.mark[b] == ODD && self.lab[b].is_zero() {
                self.expand_blossom(b);
            }
        }
        true
    }

    fn run(&mut self) {
        for _ in 0..self.n {
            if (1..=self.n).all(|v| self.st[v] == v && self.match_[v] != NONE) {
                break;
            }
            self.matching_bfs();
        }
    }
}
