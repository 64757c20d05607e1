//! DuckDB repository implementation
//!
//! Reference `Repository` adapter over an embedded DuckDB database,
//! realizing the five relations of §6: companies, tagging_rules,
//! transaction_tags, transactions, external_data.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Company, ExternalMetadata, RuleType, TaggingRule, Transaction, TransactionTag};
use crate::ports::Repository;

pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl DuckDbRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| Error::database(e.to_string()))?;
        let repo = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sys_migrations (
                migration_name VARCHAR PRIMARY KEY,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sys_migrations", [], |row| row.get(0))
            .map_err(|e| Error::database(e.to_string()))?;

        if count == 0 {
            self.run_migrations(&conn)?;
        }

        Ok(())
    }

    fn run_migrations(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                company_id VARCHAR PRIMARY KEY,
                code VARCHAR UNIQUE NOT NULL,
                name VARCHAR NOT NULL,
                metadata_schema JSON,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS tagging_rules (
                rule_id VARCHAR PRIMARY KEY,
                company_id VARCHAR NOT NULL,
                name VARCHAR NOT NULL,
                rule_type VARCHAR NOT NULL,
                priority INTEGER NOT NULL,
                rule_config JSON NOT NULL,
                conditions JSON,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (company_id, name),
                FOREIGN KEY (company_id) REFERENCES companies(company_id)
            );

            CREATE INDEX IF NOT EXISTS idx_tagging_rules_company ON tagging_rules(company_id);

            CREATE TABLE IF NOT EXISTS transactions (
                transaction_id VARCHAR PRIMARY KEY,
                product_code VARCHAR NOT NULL,
                produce_rate DECIMAL(18,6) NOT NULL,
                ledger_type VARCHAR NOT NULL,
                source VARCHAR NOT NULL,
                jurisdiction VARCHAR NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS external_data (
                transaction_id VARCHAR PRIMARY KEY,
                metadata JSON NOT NULL,
                FOREIGN KEY (transaction_id) REFERENCES transactions(transaction_id)
            );

            CREATE TABLE IF NOT EXISTS transaction_tags (
                transaction_id VARCHAR NOT NULL,
                company_id VARCHAR NOT NULL,
                tag_code VARCHAR,
                confidence_score DOUBLE NOT NULL DEFAULT 0.0,
                is_manual_override BOOLEAN NOT NULL DEFAULT FALSE,
                processing_notes VARCHAR NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (transaction_id, company_id),
                FOREIGN KEY (transaction_id) REFERENCES transactions(transaction_id),
                FOREIGN KEY (company_id) REFERENCES companies(company_id)
            );

            CREATE INDEX IF NOT EXISTS idx_transaction_tags_company ON transaction_tags(company_id);

            INSERT INTO sys_migrations (migration_name) VALUES ('001_initial_schema');
            "#,
        )
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(())
    }

    /// Seed a transaction row directly. Production transactions arrive from
    /// an upstream ingestion pipeline outside this crate's scope (§3); this
    /// is the seam integration tests and embedders use in its place.
    pub fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transactions (transaction_id, product_code, produce_rate, ledger_type,
                                       source, jurisdiction, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                transaction.id.to_string(),
                transaction.product_code,
                transaction.produce_rate.to_string(),
                transaction.ledger_type,
                transaction.source,
                transaction.jurisdiction,
                transaction.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    /// Seed an external metadata row directly, same rationale as
    /// `insert_transaction`.
    pub fn insert_external_metadata(&self, metadata: &ExternalMetadata) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let metadata_json = serde_json::to_string(&metadata.metadata)?;
        conn.execute(
            "INSERT INTO external_data (transaction_id, metadata) VALUES (?, ?)",
            params![metadata.transaction_id.to_string(), metadata_json],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn row_to_company(row: &duckdb::Row) -> duckdb::Result<Company> {
        let id_str: String = row.get(0)?;
        let metadata_schema: Option<String> = row.get(3)?;
        let created_str: String = row.get(5)?;
        let updated_str: String = row.get(6)?;
        Ok(Company {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            code: row.get(1)?,
            name: row.get(2)?,
            metadata_schema: metadata_schema.and_then(|s| serde_json::from_str(&s).ok()),
            is_active: row.get(4)?,
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }

    fn row_to_rule(row: &duckdb::Row) -> duckdb::Result<TaggingRule> {
        let id_str: String = row.get(0)?;
        let company_id_str: String = row.get(1)?;
        let rule_type_str: String = row.get(3)?;
        let rule_config_str: String = row.get(5)?;
        let conditions_str: Option<String> = row.get(6)?;
        let created_str: String = row.get(8)?;
        let updated_str: String = row.get(9)?;
        Ok(TaggingRule {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            company_id: Uuid::parse_str(&company_id_str).unwrap_or_default(),
            name: row.get(2)?,
            rule_type: RuleType::parse(&rule_type_str),
            priority: row.get(4)?,
            rule_config: serde_json::from_str(&rule_config_str).unwrap_or(serde_json::Value::Null),
            conditions: conditions_str.and_then(|s| serde_json::from_str(&s).ok()),
            is_active: row.get(7)?,
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }

    fn row_to_tag(row: &duckdb::Row) -> duckdb::Result<TransactionTag> {
        let transaction_id_str: String = row.get(0)?;
        let company_id_str: String = row.get(1)?;
        let created_str: String = row.get(6)?;
        let updated_str: String = row.get(7)?;
        Ok(TransactionTag {
            transaction_id: Uuid::parse_str(&transaction_id_str).unwrap_or_default(),
            company_id: Uuid::parse_str(&company_id_str).unwrap_or_default(),
            tag_code: row.get(2)?,
            confidence_score: row.get(3)?,
            is_manual_override: row.get(4)?,
            processing_notes: row.get(5)?,
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }
}

impl Repository for DuckDbRepository {
    fn get_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT company_id, code, name, metadata_schema, is_active, created_at, updated_at
             FROM companies WHERE code = ?",
            params![code],
            Self::row_to_company,
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn get_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT company_id, code, name, metadata_schema, is_active, created_at, updated_at
             FROM companies WHERE company_id = ?",
            params![id.to_string()],
            Self::row_to_company,
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn create_company(&self, company: &Company) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let metadata_schema = company
            .metadata_schema
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;
        conn.execute(
            "INSERT INTO companies (company_id, code, name, metadata_schema, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                company.id.to_string(),
                company.code,
                company.name,
                metadata_schema,
                company.is_active,
                company.created_at.to_rfc3339(),
                company.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn list_active_companies(&self) -> Result<Vec<Company>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT company_id, code, name, metadata_schema, is_active, created_at, updated_at
                 FROM companies WHERE is_active = TRUE",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_company)
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn active_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT rule_id, company_id, name, rule_type, priority, rule_config, conditions,
                        is_active, created_at, updated_at
                 FROM tagging_rules
                 WHERE company_id = ? AND is_active = TRUE
                 ORDER BY priority ASC",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map(params![company_id.to_string()], Self::row_to_rule)
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn all_rules_for_company(&self, company_id: Uuid) -> Result<Vec<TaggingRule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT rule_id, company_id, name, rule_type, priority, rule_config, conditions,
                        is_active, created_at, updated_at
                 FROM tagging_rules
                 WHERE company_id = ?
                 ORDER BY priority ASC",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map(params![company_id.to_string()], Self::row_to_rule)
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn get_rule_by_name(&self, company_id: Uuid, name: &str) -> Result<Option<TaggingRule>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT rule_id, company_id, name, rule_type, priority, rule_config, conditions,
                    is_active, created_at, updated_at
             FROM tagging_rules WHERE company_id = ? AND name = ?",
            params![company_id.to_string(), name],
            Self::row_to_rule,
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn upsert_rule(&self, rule: &TaggingRule) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let rule_config = serde_json::to_string(&rule.rule_config)?;
        let conditions = rule.conditions.as_ref().map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO tagging_rules (rule_id, company_id, name, rule_type, priority, rule_config,
                                        conditions, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (rule_id) DO UPDATE SET
                name = EXCLUDED.name,
                rule_type = EXCLUDED.rule_type,
                priority = EXCLUDED.priority,
                rule_config = EXCLUDED.rule_config,
                conditions = EXCLUDED.conditions,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at",
            params![
                rule.id.to_string(),
                rule.company_id.to_string(),
                rule.name,
                rule.rule_type.as_str(),
                rule.priority,
                rule_config,
                conditions,
                rule.is_active,
                rule.created_at.to_rfc3339(),
                rule.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn delete_rules_for_company(&self, company_id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM tagging_rules WHERE company_id = ?",
            params![company_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT transaction_id, product_code, produce_rate, ledger_type, source, created_at,
                    jurisdiction
             FROM transactions WHERE transaction_id = ?",
            params![id.to_string()],
            |row| {
                let id_str: String = row.get(0)?;
                let rate_str: String = row.get(2)?;
                let created_str: String = row.get(5)?;
                Ok(Transaction {
                    id: Uuid::parse_str(&id_str).unwrap_or_default(),
                    product_code: row.get(1)?,
                    produce_rate: rate_str.parse::<Decimal>().unwrap_or_default(),
                    ledger_type: row.get(3)?,
                    source: row.get(4)?,
                    jurisdiction: row.get(6)?,
                    created_at: parse_timestamp(&created_str),
                })
            },
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn get_transactions(&self, ids: &[Uuid]) -> Result<Vec<Transaction>> {
        ids.iter()
            .filter_map(|id| self.get_transaction(*id).transpose())
            .collect()
    }

    fn all_transaction_ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT transaction_id FROM transactions")
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect())
    }

    fn get_external_metadata(&self, transaction_id: Uuid) -> Result<Option<ExternalMetadata>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT transaction_id, metadata FROM external_data WHERE transaction_id = ?",
            params![transaction_id.to_string()],
            |row| {
                let id_str: String = row.get(0)?;
                let metadata_str: String = row.get(1)?;
                Ok(ExternalMetadata {
                    transaction_id: Uuid::parse_str(&id_str).unwrap_or_default(),
                    metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
                })
            },
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn get_tag(&self, transaction_id: Uuid, company_id: Uuid) -> Result<Option<TransactionTag>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT transaction_id, company_id, tag_code, confidence_score, is_manual_override,
                    processing_notes, created_at, updated_at
             FROM transaction_tags WHERE transaction_id = ? AND company_id = ?",
            params![transaction_id.to_string(), company_id.to_string()],
            Self::row_to_tag,
        )
        .map(Some)
        .or_else(|e| if is_no_rows(&e) { Ok(None) } else { Err(Error::database(e.to_string())) })
    }

    fn upsert_tag(&self, tag: &TransactionTag) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transaction_tags (transaction_id, company_id, tag_code, confidence_score,
                                           is_manual_override, processing_notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (transaction_id, company_id) DO UPDATE SET
                tag_code = EXCLUDED.tag_code,
                confidence_score = EXCLUDED.confidence_score,
                is_manual_override = EXCLUDED.is_manual_override,
                processing_notes = EXCLUDED.processing_notes,
                updated_at = EXCLUDED.updated_at",
            params![
                tag.transaction_id.to_string(),
                tag.company_id.to_string(),
                tag.tag_code,
                tag.confidence_score,
                tag.is_manual_override,
                tag.processing_notes,
                tag.created_at.to_rfc3339(),
                tag.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    fn tagged_transaction_ids(&self, company_id: Uuid) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT transaction_id FROM transaction_tags
                 WHERE company_id = ? AND tag_code IS NOT NULL",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map(params![company_id.to_string()], |row| row.get::<_, String>(0))
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect())
    }

    fn tags_for_company(&self, company_id: Uuid) -> Result<Vec<TransactionTag>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT transaction_id, company_id, tag_code, confidence_score, is_manual_override,
                        processing_notes, created_at, updated_at
                 FROM transaction_tags WHERE company_id = ?",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map(params![company_id.to_string()], Self::row_to_tag)
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn is_no_rows(err: &duckdb::Error) -> bool {
    matches!(err, duckdb::Error::QueryReturnedNoRows)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}
