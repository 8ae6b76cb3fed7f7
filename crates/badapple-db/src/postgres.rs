//! PostgreSQL store.
//!
//! One connection per run. Every statement binds its data values as
//! parameters; only validated identifiers are formatted into SQL text.
//! Counter columns may be INTEGER or BIGINT in an existing database, so
//! reads cast to BIGINT and writes bind BIGINT parameters that PostgreSQL
//! assignment-casts into the column type.

use crate::error::{DbError, Result};
use crate::schema::{
    Identifier, StoreLayout, DEFAULT_SCAFFOLD_TABLE, TABLE_COMPOUND, TABLE_METADATA,
    TABLE_SCAF2ACTIVEAID, TABLE_SCAF2CPD, TABLE_SUB2CPD,
};
use crate::store::{ActivityReader, ActivityWriter};
use async_trait::async_trait;
use badapple_common::{
    Aid, Cid, CompoundCounts, CompoundOutcome, CompoundRow, Medians, ScafId, ScaffoldCounts,
    ScaffoldRow, SubstanceOutcome,
};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row};

const COMPOUND_COUNTER_COLUMNS: &str = "COALESCE(c.nsub_total, 0)::BIGINT, \
     COALESCE(c.nsub_tested, 0)::BIGINT, COALESCE(c.nsub_active, 0)::BIGINT, \
     COALESCE(c.nass_tested, 0)::BIGINT, COALESCE(c.nass_active, 0)::BIGINT, \
     COALESCE(c.nsam_tested, 0)::BIGINT, COALESCE(c.nsam_active, 0)::BIGINT";

const SCAFFOLD_COUNTER_COLUMNS: &str = "COALESCE(ncpd_total, 0)::BIGINT, \
     COALESCE(ncpd_tested, 0)::BIGINT, COALESCE(ncpd_active, 0)::BIGINT, \
     COALESCE(nsub_total, 0)::BIGINT, COALESCE(nsub_tested, 0)::BIGINT, \
     COALESCE(nsub_active, 0)::BIGINT, COALESCE(nass_tested, 0)::BIGINT, \
     COALESCE(nass_active, 0)::BIGINT, COALESCE(nsam_tested, 0)::BIGINT, \
     COALESCE(nsam_active, 0)::BIGINT";

/// PostgreSQL-backed store.
pub struct PgStore {
    client: Mutex<Client>,
    layout: StoreLayout,
}

impl PgStore {
    /// Open the run's connection. Failure here is fatal for the run.
    pub async fn connect(conn_str: &str, layout: StoreLayout) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        tracing::debug!(schema = %layout.schema, activity_schema = %layout.activity_schema, "Connected to PostgreSQL");
        Ok(Self { client: Mutex::new(client), layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Create the engine's tables if they don't exist.
    pub async fn initialize(&self) -> Result<()> {
        let client = self.client.lock().await;
        for stmt in self.layout.ddl() {
            client.batch_execute(&stmt).await?;
        }
        Ok(())
    }

    /// Create an alternative scaffold table shaped like the default one.
    pub async fn create_scaffold_table(&self, table: &Identifier) -> Result<()> {
        if table.as_str() == DEFAULT_SCAFFOLD_TABLE {
            return Ok(());
        }
        let client = self.client.lock().await;
        client.batch_execute(&self.layout.scaffold_copy_ddl(table)).await?;
        Ok(())
    }

    fn check_closed(&self, client: &Client) -> Result<()> {
        if client.is_closed() {
            return Err(DbError::ConnectionClosed);
        }
        Ok(())
    }
}

fn compound_counts_at(row: &Row, offset: usize) -> Result<CompoundCounts> {
    Ok(CompoundCounts {
        nsub_total: row.try_get(offset)?,
        nsub_tested: row.try_get(offset + 1)?,
        nsub_active: row.try_get(offset + 2)?,
        nass_tested: row.try_get(offset + 3)?,
        nass_active: row.try_get(offset + 4)?,
        nsam_tested: row.try_get(offset + 5)?,
        nsam_active: row.try_get(offset + 6)?,
    })
}

fn scaffold_counts_at(row: &Row, offset: usize) -> Result<ScaffoldCounts> {
    Ok(ScaffoldCounts {
        ncpd_total: row.try_get(offset)?,
        ncpd_tested: row.try_get(offset + 1)?,
        ncpd_active: row.try_get(offset + 2)?,
        nsub_total: row.try_get(offset + 3)?,
        nsub_tested: row.try_get(offset + 4)?,
        nsub_active: row.try_get(offset + 5)?,
        nass_tested: row.try_get(offset + 6)?,
        nass_active: row.try_get(offset + 7)?,
        nsam_tested: row.try_get(offset + 8)?,
        nsam_active: row.try_get(offset + 9)?,
    })
}

#[async_trait]
impl ActivityReader for PgStore {
    async fn compound_ids(&self) -> Result<Vec<Cid>> {
        let sql = format!(
            "SELECT cid::BIGINT FROM {} ORDER BY cid ASC",
            self.layout.table(TABLE_COMPOUND)
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, i64>(0).map_err(DbError::from))
            .collect()
    }

    async fn compound_outcomes(&self, cid: Cid) -> Result<Vec<SubstanceOutcome>> {
        let sql = format!(
            "SELECT s.sid::BIGINT, a.{aid}::BIGINT, a.outcome::SMALLINT \
             FROM (SELECT DISTINCT sid FROM {sub2cpd} WHERE cid = $1::BIGINT) s \
             LEFT JOIN {activity} a ON a.sid = s.sid \
             ORDER BY s.sid ASC",
            aid = self.layout.assay_column,
            sub2cpd = self.layout.table(TABLE_SUB2CPD),
            activity = self.layout.activity_table(),
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[&cid]).await?;
        rows.iter()
            .map(|r| -> Result<SubstanceOutcome> {
                Ok(SubstanceOutcome {
                    sid: r.try_get(0)?,
                    aid: r.try_get(1)?,
                    outcome: r.try_get(2)?,
                })
            })
            .collect()
    }

    async fn scaffold_ids(&self, table: &Identifier) -> Result<Vec<ScafId>> {
        let sql = format!(
            "SELECT id::BIGINT FROM {} ORDER BY id ASC",
            self.layout.table(table.as_str())
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, i64>(0).map_err(DbError::from))
            .collect()
    }

    async fn scaffold_compounds(&self, scaf_id: ScafId) -> Result<Vec<CompoundRow>> {
        let sql = format!(
            "SELECT c.cid::BIGINT, {COMPOUND_COUNTER_COLUMNS} \
             FROM {compound} c \
             JOIN (SELECT DISTINCT cid FROM {scaf2cpd} WHERE scafid = $1::BIGINT) sc ON sc.cid = c.cid \
             ORDER BY c.cid ASC",
            compound = self.layout.table(TABLE_COMPOUND),
            scaf2cpd = self.layout.table(TABLE_SCAF2CPD),
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[&scaf_id]).await?;
        rows.iter()
            .map(|r| -> Result<CompoundRow> {
                Ok(CompoundRow {
                    cid: r.try_get(0)?,
                    counts: compound_counts_at(r, 1)?,
                })
            })
            .collect()
    }

    async fn outcomes_for_compounds(&self, cids: &[Cid]) -> Result<Vec<CompoundOutcome>> {
        if cids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT s.cid::BIGINT, s.sid::BIGINT, a.{aid}::BIGINT, a.outcome::SMALLINT \
             FROM (SELECT DISTINCT cid, sid FROM {sub2cpd} WHERE cid = ANY($1::BIGINT[])) s \
             JOIN {activity} a ON a.sid = s.sid \
             WHERE a.{aid} IS NOT NULL AND a.outcome IS NOT NULL",
            aid = self.layout.assay_column,
            sub2cpd = self.layout.table(TABLE_SUB2CPD),
            activity = self.layout.activity_table(),
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[&cids]).await?;
        rows.iter()
            .map(|r| -> Result<CompoundOutcome> {
                Ok(CompoundOutcome {
                    cid: r.try_get(0)?,
                    sid: r.try_get(1)?,
                    aid: r.try_get(2)?,
                    outcome: r.try_get(3)?,
                })
            })
            .collect()
    }

    async fn scaffold_rows(
        &self,
        table: &Identifier,
        min_id: ScafId,
        max_id: ScafId,
    ) -> Result<Vec<ScaffoldRow>> {
        let sql = format!(
            "SELECT id::BIGINT, {SCAFFOLD_COUNTER_COLUMNS}, pscore::FLOAT8 \
             FROM {} WHERE id >= $1::BIGINT AND id <= $2::BIGINT ORDER BY id ASC",
            self.layout.table(table.as_str())
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[&min_id, &max_id]).await?;
        rows.iter()
            .map(|r| -> Result<ScaffoldRow> {
                Ok(ScaffoldRow {
                    id: r.try_get(0)?,
                    counts: scaffold_counts_at(r, 1)?,
                    pscore: r.try_get(11)?,
                })
            })
            .collect()
    }

    async fn scaffold_id_range(&self, table: &Identifier) -> Result<Option<(ScafId, ScafId)>> {
        let sql = format!(
            "SELECT MIN(id)::BIGINT, MAX(id)::BIGINT FROM {}",
            self.layout.table(table.as_str())
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        let min: Option<i64> = row.try_get(0)?;
        let max: Option<i64> = row.try_get(1)?;
        Ok(min.zip(max))
    }

    async fn medians(&self) -> Result<Option<Medians>> {
        let sql = format!(
            "SELECT median_ncpd_tested::FLOAT8, median_nsub_tested::FLOAT8, \
             median_nass_tested::FLOAT8, median_nsam_tested::FLOAT8 FROM {} LIMIT 1",
            self.layout.table(TABLE_METADATA)
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let Some(row) = client.query_opt(sql.as_str(), &[]).await? else {
            return Ok(None);
        };
        let values: [Option<f64>; 4] = [row.try_get(0)?, row.try_get(1)?, row.try_get(2)?, row.try_get(3)?];
        // A metadata row with unset medians is as good as no row.
        match values {
            [Some(c), Some(s), Some(a), Some(w)] => Ok(Some(Medians {
                median_ncpd_tested: c,
                median_nsub_tested: s,
                median_nass_tested: a,
                median_nsam_tested: w,
            })),
            _ => Ok(None),
        }
    }

    async fn active_assays(&self, scaf_id: ScafId) -> Result<Vec<Aid>> {
        let sql = format!(
            "SELECT DISTINCT aid::BIGINT FROM {} WHERE scafid = $1::BIGINT ORDER BY 1",
            self.layout.table(TABLE_SCAF2ACTIVEAID)
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let rows = client.query(sql.as_str(), &[&scaf_id]).await?;
        rows.iter()
            .map(|r| r.try_get::<_, i64>(0).map_err(DbError::from))
            .collect()
    }
}

#[async_trait]
impl ActivityWriter for PgStore {
    async fn update_compound(&self, cid: Cid, counts: &CompoundCounts) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET \
                nsub_total = $1::BIGINT, nsub_tested = $2::BIGINT, nsub_active = $3::BIGINT, \
                nass_tested = $4::BIGINT, nass_active = $5::BIGINT, \
                nsam_tested = $6::BIGINT, nsam_active = $7::BIGINT \
             WHERE cid = $8::BIGINT",
            self.layout.table(TABLE_COMPOUND)
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let n = client
            .execute(
                sql.as_str(),
                &[
                    &counts.nsub_total,
                    &counts.nsub_tested,
                    &counts.nsub_active,
                    &counts.nass_tested,
                    &counts.nass_active,
                    &counts.nsam_tested,
                    &counts.nsam_active,
                    &cid,
                ],
            )
            .await?;
        if n == 0 {
            return Err(DbError::NotFound(format!("compound {cid}")));
        }
        Ok(())
    }

    async fn update_scaffold(
        &self,
        table: &Identifier,
        scaf_id: ScafId,
        counts: &ScaffoldCounts,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET \
                ncpd_total = $1::BIGINT, ncpd_tested = $2::BIGINT, ncpd_active = $3::BIGINT, \
                nsub_total = $4::BIGINT, nsub_tested = $5::BIGINT, nsub_active = $6::BIGINT, \
                nass_tested = $7::BIGINT, nass_active = $8::BIGINT, \
                nsam_tested = $9::BIGINT, nsam_active = $10::BIGINT \
             WHERE id = $11::BIGINT",
            self.layout.table(table.as_str())
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        let n = client
            .execute(
                sql.as_str(),
                &[
                    &counts.ncpd_total,
                    &counts.ncpd_tested,
                    &counts.ncpd_active,
                    &counts.nsub_total,
                    &counts.nsub_tested,
                    &counts.nsub_active,
                    &counts.nass_tested,
                    &counts.nass_active,
                    &counts.nsam_tested,
                    &counts.nsam_active,
                    &scaf_id,
                ],
            )
            .await?;
        if n == 0 {
            return Err(DbError::NotFound(format!("scaffold {scaf_id} in {table}")));
        }
        Ok(())
    }

    async fn insert_active_assays(&self, scaf_id: ScafId, aids: &[Aid]) -> Result<u64> {
        if aids.is_empty() {
            return Ok(0);
        }
        let table = self.layout.table(TABLE_SCAF2ACTIVEAID);
        let sql = format!(
            "INSERT INTO {table} (scafid, aid) \
             SELECT $1::BIGINT, x.aid FROM (SELECT DISTINCT UNNEST($2::BIGINT[]) AS aid) x \
             WHERE NOT EXISTS (SELECT 1 FROM {table} t WHERE t.scafid = $1::BIGINT AND t.aid = x.aid)"
        );
        let client = self.client.lock().await;
        self.check_closed(&client)?;
        Ok(client.execute(sql.as_str(), &[&scaf_id, &aids]).await?)
    }

    async fn update_scores(&self, table: &Identifier, scores: &[(Option<f64>, ScafId)]) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET pscore = $1::FLOAT8 WHERE id = $2::BIGINT",
            self.layout.table(table.as_str())
        );
        let mut client = self.client.lock().await;
        self.check_closed(&client)?;
        let tx = client.transaction().await?;
        let stmt = tx.prepare(sql.as_str()).await?;
        let mut n_update = 0;
        for (pscore, scaf_id) in scores {
            n_update += tx.execute(&stmt, &[pscore, scaf_id]).await?;
        }
        tx.commit().await?;
        Ok(n_update)
    }

    async fn store_medians(&self, medians: &Medians) -> Result<()> {
        let table = self.layout.table(TABLE_METADATA);
        let mut client = self.client.lock().await;
        self.check_closed(&client)?;
        let tx = client.transaction().await?;
        tx.execute(format!("DELETE FROM {table}").as_str(), &[]).await?;
        tx.execute(
            format!(
                "INSERT INTO {table} (median_ncpd_tested, median_nsub_tested, median_nass_tested, median_nsam_tested) \
                 VALUES ($1::FLOAT8, $2::FLOAT8, $3::FLOAT8, $4::FLOAT8)"
            )
            .as_str(),
            &[
                &medians.median_ncpd_tested,
                &medians.median_nsub_tested,
                &medians.median_nass_tested,
                &medians.median_nsam_tested,
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
