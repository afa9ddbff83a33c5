//! Targeting engine for the computer opponent.
//!
//! Everything the engine knows is re-derived from the target board's public
//! record (shot log plus revealed sunk ships) on every call, so it can never
//! drift from what actually happened on the board. The only memory carried
//! between turns is the hunt heading, and it is discarded as soon as it stops
//! matching the board.

use rand::rngs::SmallRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};

use crate::board::{offset, orthogonal_neighbors, Board, Shot};
use crate::config::{BOARD_SIZE, FLEET};
use crate::ship::{Orientation, BB};

/// A board cell as `(row, col)`.
pub type Coord = (usize, usize);

const GRID: usize = BOARD_SIZE;

/// Score added to untried neighbours of an outstanding hit (Expert).
const NEIGHBOR_BONUS: u32 = 8;
/// Score added to the axis-extension cells of a multi-hit cluster (Expert).
const AXIS_BONUS: u32 = 20;

/// Probability weights for every cell.
pub type Heatmap = [[u32; GRID]; GRID];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize, clap::ValueEnum))]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

/// Hits presumed to belong to one ship that is still afloat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    cells: Vec<Coord>,
    newest: usize,
}

impl Cluster {
    /// Cells in row-major order.
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Shot-log index of the most recent hit in the cluster.
    pub fn newest(&self) -> usize {
        self.newest
    }

    pub fn contains(&self, cell: Coord) -> bool {
        self.cells.contains(&cell)
    }

    /// Horizontal when more cells have a left/right partner than an up/down
    /// one, vertical in the opposite case, undetermined on a tie.
    pub fn axis(&self) -> Option<Orientation> {
        let mut horizontal = 0;
        let mut vertical = 0;
        for &(r, c) in &self.cells {
            let h = [offset((r, c), 0, -1), offset((r, c), 0, 1)]
                .into_iter()
                .flatten()
                .any(|n| self.contains(n));
            let v = [offset((r, c), -1, 0), offset((r, c), 1, 0)]
                .into_iter()
                .flatten()
                .any(|n| self.contains(n));
            horizontal += h as usize;
            vertical += v as usize;
        }
        match horizontal.cmp(&vertical) {
            core::cmp::Ordering::Greater => Some(Orientation::Horizontal),
            core::cmp::Ordering::Less => Some(Orientation::Vertical),
            core::cmp::Ordering::Equal => None,
        }
    }

    /// First and last cell along `axis`.
    fn ends(&self, axis: Orientation) -> (Coord, Coord) {
        let key = |&(r, c): &Coord| match axis {
            Orientation::Horizontal => (r, c),
            Orientation::Vertical => (c, r),
        };
        let lo = self.cells.iter().copied().min_by_key(key).unwrap_or((0, 0));
        let hi = self.cells.iter().copied().max_by_key(key).unwrap_or((0, 0));
        (lo, hi)
    }

    /// The cells just past each end along `axis`: `(before, after)`.
    pub fn extensions(&self, axis: Orientation) -> (Option<Coord>, Option<Coord>) {
        let (lo, hi) = self.ends(axis);
        let (dr, dc) = step(axis);
        (offset(lo, -dr, -dc), offset(hi, dr, dc))
    }
}

fn step(axis: Orientation) -> (isize, isize) {
    let (dr, dc) = axis.step();
    (dr as isize, dc as isize)
}

/// What a board's public record says about the ships on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intel {
    tried: BB,
    misses: BB,
    open_hits: BB,
    sunk_cells: BB,
    clusters: Vec<Cluster>,
    remaining: Vec<usize>,
    last: Option<Shot>,
}

impl Intel {
    /// Derive everything from the board's shot log and sunk ships.
    pub fn gather(board: &Board) -> Self {
        let mut sunk_cells = BB::new();
        let mut remaining: Vec<usize> = FLEET.iter().map(|c| c.size()).collect();
        for ship in board.sunk_ships() {
            for &(r, c) in &ship.cells {
                let _ = sunk_cells.set(r, c);
            }
            if let Some(i) = remaining.iter().position(|&s| s == ship.size) {
                remaining.swap_remove(i);
            }
        }
        remaining.sort_unstable_by(|a, b| b.cmp(a));

        let mut misses = BB::new();
        let mut open_hits = BB::new();
        let mut order = [[0usize; GRID]; GRID];
        for (i, shot) in board.shots().iter().enumerate() {
            order[shot.row][shot.col] = i;
            if !shot.hit {
                let _ = misses.set(shot.row, shot.col);
            } else if !sunk_cells.contains(shot.row, shot.col) {
                let _ = open_hits.set(shot.row, shot.col);
            }
        }

        let mut seen = BB::new();
        let mut clusters = Vec::new();
        for start in open_hits.iter() {
            if seen.contains(start.0, start.1) {
                continue;
            }
            let cells = crate::board::connected_hits(open_hits, seen, start);
            for &(r, c) in &cells {
                let _ = seen.set(r, c);
            }
            let newest = cells.iter().map(|&(r, c)| order[r][c]).max().unwrap_or(0);
            clusters.push(Cluster { cells, newest });
        }
        clusters.sort_by(|a, b| b.newest.cmp(&a.newest));

        Intel {
            tried: board.shot_mask(),
            misses,
            open_hits,
            sunk_cells,
            clusters,
            remaining,
            last: board.shots().last().copied(),
        }
    }

    pub fn tried(&self) -> BB {
        self.tried
    }

    /// Hits that do not belong to a sunk ship yet.
    pub fn open_hits(&self) -> BB {
        self.open_hits
    }

    /// Outstanding hit groups, most recently hit first.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Sizes of ships not sunk yet, largest first.
    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    pub fn last_shot(&self) -> Option<Shot> {
        self.last
    }

    /// Cells around sunk ships; no ship can be there.
    pub fn sunk_halo(&self) -> BB {
        self.sunk_cells.halo()
    }

    pub fn untried(&self) -> Vec<Coord> {
        (!self.tried).iter().collect()
    }
}

/// Remembered direction of travel along a ship being hunted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Heading {
    anchor: Coord,
    axis: Orientation,
    /// Towards increasing row/col.
    forward: bool,
}

/// The computer opponent's targeting state.
#[derive(Debug, Clone)]
pub struct AiOpponent {
    difficulty: Difficulty,
    rng: SmallRng,
    intel: Intel,
    heading: Option<Heading>,
    reported_sunk: Vec<usize>,
}

impl AiOpponent {
    pub fn new(difficulty: Difficulty) -> Self {
        Self::from_rng(difficulty, SmallRng::from_os_rng())
    }

    /// Deterministic opponent for reproducible games.
    pub fn with_seed(difficulty: Difficulty, seed: u64) -> Self {
        Self::from_rng(difficulty, SmallRng::seed_from_u64(seed))
    }

    fn from_rng(difficulty: Difficulty, rng: SmallRng) -> Self {
        Self {
            difficulty,
            rng,
            intel: Intel::default(),
            heading: None,
            reported_sunk: Vec::new(),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    /// Knowledge gathered on the last `choose_target` call.
    pub fn intel(&self) -> &Intel {
        &self.intel
    }

    /// Forget everything about the current game.
    pub fn reset(&mut self) {
        self.intel = Intel::default();
        self.heading = None;
        self.reported_sunk.clear();
    }

    /// Told by the game that one of our shots sank a ship of `size`.
    pub fn note_sunk(&mut self, size: usize) {
        self.reported_sunk.push(size);
    }

    /// Pick the next cell to fire at on `board`, or `None` when every cell
    /// has already been tried.
    pub fn choose_target(&mut self, board: &Board) -> Option<Coord> {
        self.intel = Intel::gather(board);
        self.cross_check();
        if self.intel.tried.count_ones() >= GRID * GRID {
            return None;
        }
        let pick = match self.difficulty {
            Difficulty::Easy => None,
            Difficulty::Medium => self.medium(),
            Difficulty::Hard => self.hard(),
            Difficulty::Expert => self.expert(),
        };
        pick.or_else(|| self.easy())
    }

    fn cross_check(&self) {
        let sunk_on_board = FLEET.len() - self.intel.remaining.len();
        if self.reported_sunk.len() != sunk_on_board {
            log::debug!(
                "sunk reports ({}) differ from board record ({}); using the board",
                self.reported_sunk.len(),
                sunk_on_board
            );
        }
    }

    fn easy(&mut self) -> Option<Coord> {
        self.intel.untried().choose(&mut self.rng).copied()
    }

    fn parity_cells(&self, open: BB) -> Vec<Coord> {
        open.iter().filter(|&(r, c)| (r + c) % 2 == 0).collect()
    }

    fn medium(&mut self) -> Option<Coord> {
        let open = !self.intel.tried;
        if let Some(last) = self.intel.last {
            if last.hit && self.intel.open_hits.contains(last.row, last.col) {
                let mut around: Vec<Coord> = orthogonal_neighbors(last.row, last.col)
                    .filter(|&(r, c)| open.contains(r, c))
                    .collect();
                around.shuffle(&mut self.rng);
                if let Some(&cell) = around.first() {
                    return Some(cell);
                }
            }
        }
        self.parity_cells(open).choose(&mut self.rng).copied()
    }

    fn hard(&mut self) -> Option<Coord> {
        let open = !self.intel.tried;
        if let Some(cell) = self.hunt(open) {
            return Some(cell);
        }
        self.heading = None;
        let heat = probability_grid(&self.intel, false);
        let score = |&(r, c): &Coord| heat[r][c];
        let mut scored: Vec<Coord> = self
            .parity_cells(open)
            .into_iter()
            .filter(|cell| score(cell) > 0)
            .collect();
        if scored.is_empty() {
            scored = open.iter().filter(|cell| score(cell) > 0).collect();
        }
        scored.sort_by(|a, b| score(b).cmp(&score(a)));
        let keep = scored.len().div_ceil(3);
        scored[..keep].choose(&mut self.rng).copied()
    }

    /// Finish off wounded ships: extend along a known axis, otherwise probe
    /// the neighbours of the freshest hits.
    fn hunt(&mut self, open: BB) -> Option<Coord> {
        let clusters = self.intel.clusters.clone();
        for cluster in &clusters {
            if cluster.len() >= 2 {
                if let Some(cell) = self.extend(cluster, open) {
                    return Some(cell);
                }
            }
            let mut around: Vec<Coord> = cluster
                .cells()
                .iter()
                .flat_map(|&(r, c)| orthogonal_neighbors(r, c))
                .filter(|&(r, c)| open.contains(r, c))
                .collect();
            around.sort_unstable();
            around.dedup();
            around.shuffle(&mut self.rng);
            if let Some(&cell) = around.first() {
                return Some(cell);
            }
        }
        None
    }

    fn extend(&mut self, cluster: &Cluster, open: BB) -> Option<Coord> {
        let axis = cluster.axis()?;
        let (before, after) = cluster.extensions(axis);
        let forward = match self.heading {
            Some(h) if h.axis == axis && cluster.contains(h.anchor) => h.forward,
            _ => {
                let (lo, _) = cluster.ends(axis);
                // keep walking the way the last hit moved us
                !matches!(self.intel.last, Some(s) if s.hit && (s.row, s.col) == lo)
            }
        };
        let order = if forward {
            [(after, true), (before, false)]
        } else {
            [(before, false), (after, true)]
        };
        for (cell, dir) in order {
            if let Some((r, c)) = cell {
                if open.contains(r, c) {
                    self.heading = Some(Heading {
                        anchor: cluster.cells()[0],
                        axis,
                        forward: dir,
                    });
                    return Some((r, c));
                }
            }
        }
        None
    }

    fn expert(&mut self) -> Option<Coord> {
        let open = !(self.intel.tried | self.intel.sunk_halo());
        let heat = probability_grid(&self.intel, true);

        // Multi-hit clusters first: their axis ends, plus any gap that would
        // join them to another cluster on the same line.
        let clusters = self.intel.clusters.clone();
        for cluster in clusters.iter().filter(|c| c.len() >= 2) {
            let mut candidates = bridging_gaps(&self.intel, cluster, open);
            if let Some(axis) = cluster.axis() {
                let (before, after) = cluster.extensions(axis);
                candidates.extend(
                    [before, after]
                        .into_iter()
                        .flatten()
                        .filter(|&(r, c)| open.contains(r, c)),
                );
            }
            if let Some(cell) = self.best_of(&candidates, &heat) {
                return Some(cell);
            }
        }
        if let Some(cell) = self.hunt(open) {
            return Some(cell);
        }
        self.heading = None;
        let all: Vec<Coord> = open.iter().collect();
        self.best_of(&all, &heat)
    }

    /// Highest scoring cell among `cells`, ties broken uniformly.
    fn best_of(&mut self, cells: &[Coord], heat: &Heatmap) -> Option<Coord> {
        let top = cells.iter().map(|&(r, c)| heat[r][c]).max()?;
        let best: Vec<Coord> = cells
            .iter()
            .copied()
            .filter(|&(r, c)| heat[r][c] == top)
            .collect();
        best.choose(&mut self.rng).copied()
    }
}

/// Untried cells lying between `cluster` and another outstanding hit group
/// on the same line, when the whole span could still be one remaining ship.
fn bridging_gaps(intel: &Intel, cluster: &Cluster, open: BB) -> Vec<Coord> {
    let longest = intel.remaining.first().copied().unwrap_or(0);
    let mut gaps = Vec::new();
    for other in intel.clusters.iter().filter(|o| *o != cluster) {
        for axis in [Orientation::Horizontal, Orientation::Vertical] {
            for (a, b) in [(cluster, other), (other, cluster)] {
                if let Some(between) = gap_between(a, b, axis, longest, open) {
                    gaps.extend(between);
                }
            }
        }
    }
    gaps.sort_unstable();
    gaps.dedup();
    gaps
}

/// The open cells strictly between `a` and `b` when `a` lies before `b` on
/// one line along `axis` and the span fits a ship of length `longest`.
fn gap_between(a: &Cluster, b: &Cluster, axis: Orientation, longest: usize, open: BB) -> Option<Vec<Coord>> {
    let line = |cell: Coord| match axis {
        Orientation::Horizontal => cell.0,
        Orientation::Vertical => cell.1,
    };
    let pos = |cell: Coord| match axis {
        Orientation::Horizontal => cell.1,
        Orientation::Vertical => cell.0,
    };
    let (a_lo, a_hi) = a.ends(axis);
    let (b_lo, b_hi) = b.ends(axis);
    let on_line = a.cells().iter().chain(b.cells()).all(|&c| line(c) == line(a_lo));
    if !on_line || pos(a_hi) >= pos(b_lo) || pos(b_hi) - pos(a_lo) + 1 > longest {
        return None;
    }
    let between: Vec<Coord> = (pos(a_hi) + 1..pos(b_lo))
        .map(|p| match axis {
            Orientation::Horizontal => (line(a_lo), p),
            Orientation::Vertical => (p, line(a_lo)),
        })
        .collect();
    between.iter().all(|&(r, c)| open.contains(r, c)).then_some(between)
}

/// Count, for every untried cell, the legal placements of remaining ships
/// covering it.
///
/// With `enhanced` set, placements may not touch sunk ships, placements over
/// outstanding hits count double, and the neighbours and axis extensions of
/// outstanding hits get flat bonuses.
pub fn probability_grid(intel: &Intel, enhanced: bool) -> Heatmap {
    let mut heat = [[0u32; GRID]; GRID];
    let blocked = if enhanced {
        intel.misses | intel.sunk_cells | intel.sunk_halo()
    } else {
        intel.misses
    };

    for &len in &intel.remaining {
        for orient in [Orientation::Horizontal, Orientation::Vertical] {
            let (dr, dc) = orient.step();
            for r in 0..GRID - dr * (len - 1) {
                for c in 0..GRID - dc * (len - 1) {
                    let cells = (0..len).map(|k| (r + dr * k, c + dc * k));
                    if cells.clone().any(|(rr, cc)| blocked.contains(rr, cc)) {
                        continue;
                    }
                    let covers_hit = cells.clone().any(|(rr, cc)| intel.open_hits.contains(rr, cc));
                    let weight = if enhanced && covers_hit { 2 } else { 1 };
                    for (rr, cc) in cells {
                        if !intel.tried.contains(rr, cc) {
                            heat[rr][cc] += weight;
                        }
                    }
                }
            }
        }
    }

    if enhanced {
        for (r, c) in intel.open_hits.iter() {
            for (nr, nc) in orthogonal_neighbors(r, c) {
                if !intel.tried.contains(nr, nc) && !blocked.contains(nr, nc) {
                    heat[nr][nc] += NEIGHBOR_BONUS;
                }
            }
        }
        for cluster in intel.clusters.iter().filter(|c| c.len() >= 2) {
            if let Some(axis) = cluster.axis() {
                let (before, after) = cluster.extensions(axis);
                for (r, c) in [before, after].into_iter().flatten() {
                    if !intel.tried.contains(r, c) && !blocked.contains(r, c) {
                        heat[r][c] += AXIS_BONUS;
                    }
                }
            }
        }
    }
    heat
}

/// Uniformly random untried cell on `board`, used for forced shots.
pub fn random_untried<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Coord> {
    let cells: Vec<Coord> = (!board.shot_mask()).iter().collect();
    cells.choose(rng).copied()
}
