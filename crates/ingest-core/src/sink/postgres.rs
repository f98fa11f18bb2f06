use crate::{
    error::SinkError,
    retry::{RetryDisposition, RetryPolicy},
    sink::BulkWriter,
};
use async_trait::async_trait;
use model::records::site::SiteRecord;
use tokio_postgres::{Client, NoTls, error::SqlState, types::ToSql};
use tracing::{debug, error, info};

/// Parameters bound per record in the multi-row upsert statement.
const UPSERT_PARAMS: usize = 8;

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    site_id TEXT PRIMARY KEY,
    exp_date DATE,
    total_rental DOUBLE PRECISION NOT NULL DEFAULT 0,
    total_payment_to_pay DOUBLE PRECISION NOT NULL DEFAULT 0,
    deposit DOUBLE PRECISION NOT NULL DEFAULT 0,
    attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
    last_job_id TEXT,
    upload_status TEXT NOT NULL DEFAULT 'active',
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS sites_last_job_id_idx ON sites (last_job_id);
"#;

/// Bulk writer against a Postgres target store. One multi-row
/// `INSERT .. ON CONFLICT (site_id) DO UPDATE` per chunk, with the writer's
/// own retry policy around each statement.
pub struct PostgresBulkWriter {
    client: Client,
    retry: RetryPolicy,
}

impl PostgresBulkWriter {
    pub async fn connect(conn_str: &str) -> Result<Self, SinkError> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "Postgres connection error");
            }
        });
        Ok(Self {
            client,
            retry: RetryPolicy::for_target_store(),
        })
    }

    /// Bootstrap the target table on first use.
    pub async fn ensure_schema(&self) -> Result<(), SinkError> {
        self.client.batch_execute(SCHEMA_DDL).await?;
        Ok(())
    }

    fn upsert_sql(row_count: usize) -> String {
        let mut sql = String::from(
            "INSERT INTO sites (site_id, exp_date, total_rental, total_payment_to_pay, \
             deposit, attributes, last_job_id, updated_at) VALUES ",
        );
        for row in 0..row_count {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for param in 0..UPSERT_PARAMS {
                if param > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&format!("${}", row * UPSERT_PARAMS + param + 1));
            }
            sql.push(')');
        }
        // COALESCE keeps a previously written expiry date when the new row
        // carries none; the merge on attributes keeps keys the new row does
        // not override. Both make re-delivery of a chunk a no-op.
        sql.push_str(
            " ON CONFLICT (site_id) DO UPDATE SET \
             exp_date = COALESCE(EXCLUDED.exp_date, sites.exp_date), \
             total_rental = EXCLUDED.total_rental, \
             total_payment_to_pay = EXCLUDED.total_payment_to_pay, \
             deposit = EXCLUDED.deposit, \
             attributes = sites.attributes || EXCLUDED.attributes, \
             last_job_id = EXCLUDED.last_job_id, \
             upload_status = 'active', \
             updated_at = EXCLUDED.updated_at",
        );
        sql
    }

    fn classify(err: &tokio_postgres::Error) -> RetryDisposition {
        if err.is_closed() {
            return RetryDisposition::Retry;
        }
        match err.code() {
            Some(&SqlState::T_R_SERIALIZATION_FAILURE)
            | Some(&SqlState::T_R_DEADLOCK_DETECTED) => RetryDisposition::Retry,
            _ => RetryDisposition::Stop,
        }
    }
}

#[async_trait]
impl BulkWriter for PostgresBulkWriter {
    async fn upsert(&self, job_id: &str, records: &[SiteRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let sql = Self::upsert_sql(records.len());
        let job_id_param = job_id.to_string();
        let attribute_payloads: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                serde_json::to_value(&record.attributes)
                    .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
            })
            .collect();

        let mut params: Vec<&(dyn ToSql + Sync)> =
            Vec::with_capacity(records.len() * UPSERT_PARAMS);
        for (record, attributes) in records.iter().zip(&attribute_payloads) {
            params.push(&record.site_id);
            params.push(&record.exp_date);
            params.push(&record.total_rental);
            params.push(&record.total_payment_to_pay);
            params.push(&record.deposit);
            params.push(attributes);
            params.push(&job_id_param);
            params.push(&record.updated_at);
        }

        let client = &self.client;
        let sql_ref = sql.as_str();
        let params_ref = &params[..];
        let result = self
            .retry
            .run(
                move || {
                    let client = client;
                    let sql = sql_ref;
                    let params = params_ref;
                    async move { client.execute(sql, params).await }
                },
                Self::classify,
            )
            .await;

        match result {
            Ok(rows) => {
                debug!(job_id = %job_id, records = records.len(), rows, "Chunk upserted");
                Ok(())
            }
            Err(err) => Err(SinkError::Postgres(err.into_inner())),
        }
    }

    async fn tag_cancelled(&self, job_id: &str) -> Result<(), SinkError> {
        let tagged = self
            .client
            .execute(
                "UPDATE sites SET upload_status = 'cancelled', updated_at = now() \
                 WHERE last_job_id = $1",
                &[&job_id],
            )
            .await?;
        info!(job_id = %job_id, tagged, "Tagged records of cancelled job");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_sql_numbers_placeholders_per_row() {
        let sql = PostgresBulkWriter::upsert_sql(2);
        assert!(sql.contains("($1, $2, $3, $4, $5, $6, $7, $8)"));
        assert!(sql.contains("($9, $10, $11, $12, $13, $14, $15, $16)"));
        assert!(sql.contains("ON CONFLICT (site_id) DO UPDATE"));
        assert!(sql.contains("COALESCE(EXCLUDED.exp_date, sites.exp_date)"));
    }
}
