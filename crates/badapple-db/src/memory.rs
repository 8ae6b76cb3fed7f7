//! In-process store.
//!
//! Mirrors the PostgreSQL tables closely enough to run the full pipeline
//! without a server. Writes to selected rows can be made to fail, and the
//! store can be "disconnected", to exercise error handling.

use crate::error::{DbError, Result};
use crate::schema::{Identifier, DEFAULT_SCAFFOLD_TABLE};
use crate::store::{ActivityReader, ActivityWriter};
use async_trait::async_trait;
use badapple_common::{
    ActivityResult, Aid, Cid, CompoundCounts, CompoundOutcome, CompoundRow, Medians, ScafId,
    ScaffoldCounts, ScaffoldRow, Sid, SubstanceOutcome,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    compounds: BTreeMap<Cid, CompoundCounts>,
    /// sid → cid
    substances: BTreeMap<Sid, Cid>,
    activity: Vec<ActivityResult>,
    scaf2cpd: BTreeSet<(ScafId, Cid)>,
    scaffolds: HashMap<String, BTreeMap<ScafId, ScaffoldRow>>,
    scaf2activeaid: BTreeSet<(ScafId, Aid)>,
    medians: Option<Medians>,
    failing_compounds: HashSet<Cid>,
    failing_scaffolds: HashSet<ScafId>,
    disconnected: bool,
    score_batches: usize,
}

/// Store backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live(&self) -> Result<MutexGuard<'_, Tables>> {
        let tables = self.lock();
        if tables.disconnected {
            return Err(DbError::ConnectionClosed);
        }
        Ok(tables)
    }

    // ── Seeding ──────────────────────────────────────────────────────────────

    pub fn add_compound(&self, cid: Cid) {
        self.lock().compounds.entry(cid).or_default();
    }

    /// Register a substance under a compound, creating the compound if needed.
    pub fn add_substance(&self, sid: Sid, cid: Cid) {
        let mut t = self.lock();
        t.compounds.entry(cid).or_default();
        t.substances.insert(sid, cid);
    }

    pub fn add_result(&self, sid: Sid, aid: Aid, outcome: i16) {
        self.lock().activity.push(ActivityResult { sid, aid, outcome });
    }

    /// Create `table` with no rows.
    pub fn create_scaffold_table(&self, table: &str) {
        self.lock().scaffolds.entry(table.to_string()).or_default();
    }

    /// Add an empty scaffold row to `table`.
    pub fn add_scaffold(&self, table: &str, scaf_id: ScafId) {
        self.lock()
            .scaffolds
            .entry(table.to_string())
            .or_default()
            .entry(scaf_id)
            .or_insert(ScaffoldRow { id: scaf_id, counts: ScaffoldCounts::default(), pscore: None });
    }

    /// Link a compound to a scaffold.
    pub fn link(&self, scaf_id: ScafId, cid: Cid) {
        self.lock().scaf2cpd.insert((scaf_id, cid));
    }

    /// Overwrite a compound's counters directly, bypassing the aggregator.
    pub fn set_compound_counts(&self, cid: Cid, counts: CompoundCounts) {
        self.lock().compounds.insert(cid, counts);
    }

    /// Overwrite a scaffold's counters directly, bypassing the aggregator.
    pub fn set_scaffold_counts(&self, table: &str, scaf_id: ScafId, counts: ScaffoldCounts) {
        self.lock()
            .scaffolds
            .entry(table.to_string())
            .or_default()
            .entry(scaf_id)
            .and_modify(|row| row.counts = counts)
            .or_insert(ScaffoldRow { id: scaf_id, counts, pscore: None });
    }

    pub fn set_pscore(&self, table: &str, scaf_id: ScafId, pscore: Option<f64>) {
        if let Some(row) = self
            .lock()
            .scaffolds
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&scaf_id))
        {
            row.pscore = pscore;
        }
    }

    /// Make every write to this compound fail.
    pub fn fail_writes_for_compound(&self, cid: Cid) {
        self.lock().failing_compounds.insert(cid);
    }

    /// Make every write to this scaffold fail, in any table.
    pub fn fail_writes_for_scaffold(&self, scaf_id: ScafId) {
        self.lock().failing_scaffolds.insert(scaf_id);
    }

    /// Simulate a lost connection: every later call fails fatally.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn compound(&self, cid: Cid) -> Option<CompoundCounts> {
        self.lock().compounds.get(&cid).copied()
    }

    pub fn scaffold(&self, table: &str, scaf_id: ScafId) -> Option<ScaffoldRow> {
        self.lock().scaffolds.get(table).and_then(|rows| rows.get(&scaf_id)).copied()
    }

    pub fn scaffold_default(&self, scaf_id: ScafId) -> Option<ScaffoldRow> {
        self.scaffold(DEFAULT_SCAFFOLD_TABLE, scaf_id)
    }

    /// All provenance rows, ascending.
    pub fn active_assay_rows(&self) -> Vec<(ScafId, Aid)> {
        self.lock().scaf2activeaid.iter().copied().collect()
    }

    /// Number of batched score writes performed.
    pub fn score_batches(&self) -> usize {
        self.lock().score_batches
    }

    fn scaffold_table<'a>(t: &'a Tables, table: &Identifier) -> Result<&'a BTreeMap<ScafId, ScaffoldRow>> {
        t.scaffolds
            .get(table.as_str())
            .ok_or_else(|| DbError::NotFound(format!("table {table}")))
    }
}

#[async_trait]
impl ActivityReader for MemoryStore {
    async fn compound_ids(&self) -> Result<Vec<Cid>> {
        Ok(self.live()?.compounds.keys().copied().collect())
    }

    async fn compound_outcomes(&self, cid: Cid) -> Result<Vec<SubstanceOutcome>> {
        let t = self.live()?;
        let mut rows = Vec::new();
        for (&sid, _) in t.substances.iter().filter(|&(_, &owner)| owner == cid) {
            let before = rows.len();
            rows.extend(t.activity.iter().filter(|r| r.sid == sid).map(|r| SubstanceOutcome {
                sid,
                aid: Some(r.aid),
                outcome: Some(r.outcome),
            }));
            if rows.len() == before {
                rows.push(SubstanceOutcome { sid, aid: None, outcome: None });
            }
        }
        Ok(rows)
    }

    async fn scaffold_ids(&self, table: &Identifier) -> Result<Vec<ScafId>> {
        let t = self.live()?;
        Ok(Self::scaffold_table(&t, table)?.keys().copied().collect())
    }

    async fn scaffold_compounds(&self, scaf_id: ScafId) -> Result<Vec<CompoundRow>> {
        let t = self.live()?;
        Ok(t.scaf2cpd
            .range((scaf_id, Cid::MIN)..=(scaf_id, Cid::MAX))
            .filter_map(|&(_, cid)| t.compounds.get(&cid).map(|&counts| CompoundRow { cid, counts }))
            .collect())
    }

    async fn outcomes_for_compounds(&self, cids: &[Cid]) -> Result<Vec<CompoundOutcome>> {
        let t = self.live()?;
        let wanted: HashSet<Cid> = cids.iter().copied().collect();
        Ok(t.activity
            .iter()
            .filter_map(|r| {
                let cid = *t.substances.get(&r.sid)?;
                wanted.contains(&cid).then_some(CompoundOutcome {
                    cid,
                    sid: r.sid,
                    aid: r.aid,
                    outcome: r.outcome,
                })
            })
            .collect())
    }

    async fn scaffold_rows(
        &self,
        table: &Identifier,
        min_id: ScafId,
        max_id: ScafId,
    ) -> Result<Vec<ScaffoldRow>> {
        let t = self.live()?;
        if min_id > max_id {
            return Ok(Vec::new());
        }
        Ok(Self::scaffold_table(&t, table)?
            .range(min_id..=max_id)
            .map(|(_, row)| *row)
            .collect())
    }

    async fn scaffold_id_range(&self, table: &Identifier) -> Result<Option<(ScafId, ScafId)>> {
        let t = self.live()?;
        let rows = Self::scaffold_table(&t, table)?;
        Ok(rows.keys().next().copied().zip(rows.keys().next_back().copied()))
    }

    async fn medians(&self) -> Result<Option<Medians>> {
        Ok(self.live()?.medians)
    }

    async fn active_assays(&self, scaf_id: ScafId) -> Result<Vec<Aid>> {
        let t = self.live()?;
        Ok(t.scaf2activeaid
            .range((scaf_id, Aid::MIN)..=(scaf_id, Aid::MAX))
            .map(|&(_, aid)| aid)
            .collect())
    }
}

#[async_trait]
impl ActivityWriter for MemoryStore {
    async fn update_compound(&self, cid: Cid, counts: &CompoundCounts) -> Result<()> {
        let mut t = self.live()?;
        if t.failing_compounds.contains(&cid) {
            return Err(DbError::Unavailable(format!("write to compound {cid} rejected")));
        }
        match t.compounds.get_mut(&cid) {
            Some(row) => {
                *row = *counts;
                Ok(())
            }
            None => Err(DbError::NotFound(format!("compound {cid}"))),
        }
    }

    async fn update_scaffold(
        &self,
        table: &Identifier,
        scaf_id: ScafId,
        counts: &ScaffoldCounts,
    ) -> Result<()> {
        let mut t = self.live()?;
        if t.failing_scaffolds.contains(&scaf_id) {
            return Err(DbError::Unavailable(format!("write to scaffold {scaf_id} rejected")));
        }
        match t.scaffolds.get_mut(table.as_str()).and_then(|rows| rows.get_mut(&scaf_id)) {
            Some(row) => {
                row.counts = *counts;
                Ok(())
            }
            None => Err(DbError::NotFound(format!("scaffold {scaf_id} in {table}"))),
        }
    }

    async fn insert_active_assays(&self, scaf_id: ScafId, aids: &[Aid]) -> Result<u64> {
        let mut t = self.live()?;
        let mut inserted = 0;
        for &aid in aids {
            if t.scaf2activeaid.insert((scaf_id, aid)) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn update_scores(&self, table: &Identifier, scores: &[(Option<f64>, ScafId)]) -> Result<u64> {
        let mut t = self.live()?;
        let rows = t
            .scaffolds
            .get_mut(table.as_str())
            .ok_or_else(|| DbError::NotFound(format!("table {table}")))?;
        let mut n_update = 0;
        for &(pscore, scaf_id) in scores {
            if let Some(row) = rows.get_mut(&scaf_id) {
                row.pscore = pscore;
                n_update += 1;
            }
        }
        t.score_batches += 1;
        Ok(n_update)
    }

    async fn store_medians(&self, medians: &Medians) -> Result<()> {
        self.live()?.medians = Some(*medians);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold_table() -> Identifier {
        Identifier::new(DEFAULT_SCAFFOLD_TABLE).unwrap()
    }

    #[tokio::test]
    async fn test_substance_without_outcomes_is_left_joined() {
        let store = MemoryStore::new();
        store.add_substance(10, 1);
        store.add_substance(11, 1);
        store.add_result(11, 500, 2);

        let rows = store.compound_outcomes(1).await.unwrap();
        assert_eq!(
            rows,
            vec![
                SubstanceOutcome { sid: 10, aid: None, outcome: None },
                SubstanceOutcome { sid: 11, aid: Some(500), outcome: Some(2) },
            ]
        );
    }

    #[tokio::test]
    async fn test_provenance_insert_skips_existing_pairs() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_active_assays(3, &[7, 8]).await.unwrap(), 2);
        assert_eq!(store.insert_active_assays(3, &[8, 9]).await.unwrap(), 1);
        assert_eq!(store.active_assays(3).await.unwrap(), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_failing_write_leaves_row_untouched() {
        let store = MemoryStore::new();
        store.add_compound(5);
        store.fail_writes_for_compound(5);

        let counts = CompoundCounts { nsub_total: 3, ..Default::default() };
        let err = store.update_compound(5, &counts).await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(store.compound(5), Some(CompoundCounts::default()));
    }

    #[tokio::test]
    async fn test_disconnect_is_fatal() {
        let store = MemoryStore::new();
        store.add_compound(1);
        store.disconnect();
        let err = store.compound_ids().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_scaffold_id_range() {
        let store = MemoryStore::new();
        let table = scaffold_table();
        store.add_scaffold(DEFAULT_SCAFFOLD_TABLE, 40);
        store.add_scaffold(DEFAULT_SCAFFOLD_TABLE, 4);
        store.add_scaffold(DEFAULT_SCAFFOLD_TABLE, 12);
        assert_eq!(store.scaffold_id_range(&table).await.unwrap(), Some((4, 40)));
        assert_eq!(store.scaffold_rows(&table, 5, 40).await.unwrap().len(), 2);
    }
}
