//! PageRank over the note graph. Ranks feed the ordering of every note's
//! link and backlink lists, so heavily referenced notes surface first.

use std::collections::HashMap;

use crate::{noteid::NoteId, store::GraphStore};

const DAMPING: f64 = 0.85;
const EPSILON: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;

/// Compute every note's rank by power iteration and re-order each note's
/// link and backlink lists by descending rank. Iteration stops when the
/// largest per-note delta drops below `EPSILON`.
pub fn rank_notes(store: &mut GraphStore) {
    let ids: Vec<NoteId> = store.notes().keys().copied().collect();
    let n = ids.len();
    if n == 0 {
        return;
    }

    let index: HashMap<NoteId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    // Out-degree and inbound edge lists, resolved once up front.
    let mut out_degree = vec![0usize; n];
    let mut inbound: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (id, note) in store.notes() {
        let i = index[id];
        out_degree[i] = note.link_ids.len();
        for target in &note.link_ids {
            inbound[index[target]].push(i);
        }
    }

    let nf = n as f64;
    let base = (1.0 - DAMPING) / nf;
    let mut ranks = vec![1.0 / nf; n];
    for iteration in 0..MAX_ITERATIONS {
        // Notes without outgoing links spread their mass evenly.
        let dangling: f64 = ranks
            .iter()
            .zip(&out_degree)
            .filter(|(_, deg)| **deg == 0)
            .map(|(r, _)| *r)
            .sum();
        let dangling_share = DAMPING * dangling / nf;

        let mut next = vec![base + dangling_share; n];
        for (i, sources) in inbound.iter().enumerate() {
            for &j in sources {
                next[i] += DAMPING * ranks[j] / out_degree[j] as f64;
            }
        }

        let delta = ranks
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        ranks = next;
        if delta < EPSILON {
            tracing::debug!("pagerank converged after {} iterations", iteration + 1);
            break;
        }
    }

    for (id, i) in &index {
        if let Some(note) = store.notes_mut().get_mut(id) {
            note.rank = ranks[*i];
        }
    }
    let by_rank: HashMap<NoteId, f64> = index.iter().map(|(id, i)| (*id, ranks[*i])).collect();
    for note in store.notes_mut().values_mut() {
        note.link_ids
            .sort_by(|a, b| by_rank[b].total_cmp(&by_rank[a]));
        note.backlink_ids
            .sort_by(|a, b| by_rank[b].total_cmp(&by_rank[a]));
    }
}
