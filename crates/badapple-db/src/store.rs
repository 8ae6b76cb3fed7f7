//! Store traits consumed by the annotation and scoring engines.
//!
//! Reads and writes are split so that code which only inspects the store can
//! say so in its bounds. Writes overwrite; calling one twice with the same
//! arguments leaves the store in the same state.

use crate::error::Result;
use crate::schema::Identifier;
use async_trait::async_trait;
use badapple_common::{
    Aid, Cid, CompoundCounts, CompoundOutcome, CompoundRow, Medians, ScafId, ScaffoldCounts,
    ScaffoldRow, SubstanceOutcome,
};

/// Read side of the store.
#[async_trait]
pub trait ActivityReader: Send + Sync {
    /// All compound ids, ascending.
    async fn compound_ids(&self) -> Result<Vec<Cid>>;

    /// Every substance of `cid` left-joined with its outcome rows, ordered by `sid`.
    /// A substance without outcomes appears once with `aid`/`outcome` set to `None`.
    async fn compound_outcomes(&self, cid: Cid) -> Result<Vec<SubstanceOutcome>>;

    /// All scaffold ids of `table`, ascending.
    async fn scaffold_ids(&self, table: &Identifier) -> Result<Vec<ScafId>>;

    /// Compounds linked to a scaffold, with their stored counters, ordered by `cid`.
    async fn scaffold_compounds(&self, scaf_id: ScafId) -> Result<Vec<CompoundRow>>;

    /// Outcome rows of all substances of the given compounds.
    /// Substances without outcomes contribute nothing.
    async fn outcomes_for_compounds(&self, cids: &[Cid]) -> Result<Vec<CompoundOutcome>>;

    /// Scaffold rows with `min_id <= id <= max_id`, ascending by id.
    async fn scaffold_rows(
        &self,
        table: &Identifier,
        min_id: ScafId,
        max_id: ScafId,
    ) -> Result<Vec<ScaffoldRow>>;

    /// Smallest and largest scaffold id, `None` for an empty table.
    async fn scaffold_id_range(&self, table: &Identifier) -> Result<Option<(ScafId, ScafId)>>;

    /// The stored median baselines, if they have been computed.
    async fn medians(&self) -> Result<Option<Medians>>;

    /// Assays recorded as active evidence for a scaffold, ascending.
    async fn active_assays(&self, scaf_id: ScafId) -> Result<Vec<Aid>>;
}

/// Write side of the store.
#[async_trait]
pub trait ActivityWriter: Send + Sync {
    /// Overwrite the seven counters of one compound row.
    async fn update_compound(&self, cid: Cid, counts: &CompoundCounts) -> Result<()>;

    /// Overwrite the ten counters of one scaffold row in `table`.
    async fn update_scaffold(
        &self,
        table: &Identifier,
        scaf_id: ScafId,
        counts: &ScaffoldCounts,
    ) -> Result<()>;

    /// Record `(scaf_id, aid)` provenance rows, skipping pairs already present.
    /// Returns the number of rows inserted.
    async fn insert_active_assays(&self, scaf_id: ScafId, aids: &[Aid]) -> Result<u64>;

    /// Write all `(pscore, scaf_id)` pairs in one unit of work.
    /// Returns the number of rows updated.
    async fn update_scores(&self, table: &Identifier, scores: &[(Option<f64>, ScafId)]) -> Result<u64>;

    /// Replace the stored median baselines.
    async fn store_medians(&self, medians: &Medians) -> Result<()>;
}

/// A store that can be both read and written.
pub trait ActivityStore: ActivityReader + ActivityWriter {}

impl<T: ActivityReader + ActivityWriter + ?Sized> ActivityStore for T {}
