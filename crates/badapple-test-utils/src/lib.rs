//! badapple-test-utils: Fixtures that seed an in-memory store.
//!
//! ```ignore
//! let store = Fixture::new()
//!     .compound(1, &[&[(1, 2)], &[(1, 1), (2, 4)]])
//!     .scaffold(1, &[1])
//!     .build();
//! ```

use badapple_common::{Aid, Cid, ScafId, Sid};
use badapple_db::{MemoryStore, DEFAULT_SCAFFOLD_TABLE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use pretty_assertions;

/// Builder over [`MemoryStore`]. Substance ids are assigned sequentially.
#[derive(Debug)]
pub struct Fixture {
    store: MemoryStore,
    next_sid: Sid,
}

impl Fixture {
    pub fn new() -> Self {
        Self { store: MemoryStore::new(), next_sid: 1 }
    }

    /// Add a compound with one entry per substance; each entry lists the
    /// substance's `(aid, outcome)` rows. An empty entry is a substance that
    /// was never tested.
    pub fn compound(mut self, cid: Cid, substances: &[&[(Aid, i16)]]) -> Self {
        self.store.add_compound(cid);
        for results in substances {
            let sid = self.next_sid;
            self.next_sid += 1;
            self.store.add_substance(sid, cid);
            for &(aid, outcome) in *results {
                self.store.add_result(sid, aid, outcome);
            }
        }
        self
    }

    /// Add a scaffold to the default table and link it to `cids`.
    pub fn scaffold(self, scaf_id: ScafId, cids: &[Cid]) -> Self {
        self.scaffold_in(DEFAULT_SCAFFOLD_TABLE, scaf_id, cids)
    }

    /// Add a scaffold row to `table` and link it to `cids`. Links are shared
    /// by every scaffold table.
    pub fn scaffold_in(self, table: &str, scaf_id: ScafId, cids: &[Cid]) -> Self {
        self.store.add_scaffold(table, scaf_id);
        for &cid in cids {
            self.store.link(scaf_id, cid);
        }
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

/// Compound 1 with two substances: one active in assay 1, one inactive in
/// assay 1 and unspecified in assay 2.
pub fn two_substance_compound() -> MemoryStore {
    Fixture::new().compound(1, &[&[(1, 2)], &[(1, 1), (2, 4)]]).build()
}

/// Scaffold 1 over compound 100 (active in assay 7) and compound 200
/// (inactive in assay 7).
pub fn shared_assay_scaffold() -> MemoryStore {
    Fixture::new()
        .compound(100, &[&[(7, 2)]])
        .compound(200, &[&[(7, 1)]])
        .scaffold(1, &[100, 200])
        .build()
}

/// Parameters for [`random_store`].
#[derive(Debug, Clone, Copy)]
pub struct RandomShape {
    pub n_compounds: i64,
    pub n_scaffolds: i64,
    pub n_assays: i64,
    pub max_substances: usize,
    pub max_results: usize,
    pub max_links: usize,
}

impl Default for RandomShape {
    fn default() -> Self {
        Self {
            n_compounds: 40,
            n_scaffolds: 15,
            n_assays: 8,
            max_substances: 3,
            max_results: 5,
            max_links: 6,
        }
    }
}

/// A reproducible random store. Compounds may share scaffolds and appear
/// under several of them; some substances have no results.
pub fn random_store(seed: u64, shape: RandomShape) -> MemoryStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fixture = Fixture::new();

    for cid in 1..=shape.n_compounds {
        let n_sub = rng.gen_range(1..=shape.max_substances);
        let substances: Vec<Vec<(Aid, i16)>> = (0..n_sub)
            .map(|_| {
                let n_res = rng.gen_range(0..=shape.max_results);
                (0..n_res)
                    .map(|_| (rng.gen_range(1..=shape.n_assays), rng.gen_range(1..=5)))
                    .collect()
            })
            .collect();
        let refs: Vec<&[(Aid, i16)]> = substances.iter().map(Vec::as_slice).collect();
        fixture = fixture.compound(cid, &refs);
    }

    for scaf_id in 1..=shape.n_scaffolds {
        let n_links = rng.gen_range(0..=shape.max_links);
        let cids: Vec<Cid> = (0..n_links)
            .map(|_| rng.gen_range(1..=shape.n_compounds))
            .collect();
        fixture = fixture.scaffold(scaf_id, &cids);
    }
    fixture.build()
}
