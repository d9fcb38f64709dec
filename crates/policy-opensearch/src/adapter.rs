//! Policy store adapter.
//!
//! # Purpose
//! Translates between rule tuples and policy documents in a single index:
//! keyed upserts and deletes for individual rules, predicate deletes for
//! filtered removal, and full load/save of a [`PolicyModel`].
//!
//! # Key invariants
//! - Every mutation is written with [`Refresh::Immediate`], so the next load
//!   observes it.
//! - Malformed input is rejected with `InvalidRule` before any store call.
//! - Deleting a rule that is not stored succeeds.
//! - `save_policy` is not atomic: a failure after the clear leaves the index
//!   holding only the rules written so far.
use crate::errors::{AdapterError, AdapterResult, StoreError};
use crate::loader::{LoadOptions, LoadReport, ScrollLoader};
use crate::model::PolicyModel;
use crate::record::{FIELD_NAMES, MAX_FIELDS, PolicyRecord, document_id, index_mapping};
use crate::store::{DeleteOutcome, DocumentStore, Query, Refresh};
use std::sync::Arc;

#[derive(Clone)]
pub struct PolicyAdapter {
    store: Arc<dyn DocumentStore>,
    index: String,
    options: LoadOptions,
}

impl PolicyAdapter {
    /// Build an adapter and make sure the policy index exists.
    pub async fn connect(
        store: Arc<dyn DocumentStore>,
        index: impl Into<String>,
        options: LoadOptions,
    ) -> AdapterResult<Self> {
        let adapter = Self {
            store,
            index: index.into(),
            options,
        };
        adapter.ensure_index().await?;
        Ok(adapter)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn health_check(&self) -> AdapterResult<()> {
        Ok(self.store.health_check().await?)
    }

    /// Check-then-create the keyword schema. Losing a creation race to
    /// another instance counts as success.
    pub async fn ensure_index(&self) -> AdapterResult<()> {
        if self.store.index_exists(&self.index).await? {
            return Ok(());
        }
        match self.store.create_index(&self.index, &index_mapping()).await {
            Ok(()) => {
                tracing::info!(index = %self.index, "created policy index");
                Ok(())
            }
            Err(StoreError::IndexAlreadyExists(_)) => {
                tracing::debug!(index = %self.index, "policy index created concurrently");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn add_policy(&self, section: &str, ptype: &str, rule: &[String]) -> AdapterResult<()> {
        let record = PolicyRecord::from_rule(ptype, rule).map_err(AdapterError::InvalidRule)?;
        self.write_record(section, &record).await
    }

    /// Validate every rule, then write them one by one.
    pub async fn add_policies(
        &self,
        section: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<()> {
        let records = rules
            .iter()
            .map(|rule| PolicyRecord::from_rule(ptype, rule))
            .collect::<Result<Vec<_>, _>>()
            .map_err(AdapterError::InvalidRule)?;
        for record in &records {
            self.write_record(section, record).await?;
        }
        Ok(())
    }

    async fn write_record(&self, section: &str, record: &PolicyRecord) -> AdapterResult<()> {
        let id = record.document_id();
        let document = serde_json::to_value(record)?;
        self.store
            .put_document(&self.index, &id, &document, Refresh::Immediate)
            .await?;
        metrics::counter!("policy_adapter_writes_total", "operation" => "add").increment(1);
        tracing::debug!(section, ptype = %record.ptype, document_id = %id, "policy stored");
        Ok(())
    }

    pub async fn remove_policy(
        &self,
        section: &str,
        ptype: &str,
        rule: &[String],
    ) -> AdapterResult<()> {
        if ptype.is_empty() {
            return Err(AdapterError::InvalidRule("ptype must not be empty".to_string()));
        }
        let id = document_id(rule).map_err(AdapterError::InvalidRule)?;
        self.delete_by_id(section, ptype, &id).await
    }

    pub async fn remove_policies(
        &self,
        section: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> AdapterResult<()> {
        if ptype.is_empty() {
            return Err(AdapterError::InvalidRule("ptype must not be empty".to_string()));
        }
        let ids = rules
            .iter()
            .map(|rule| document_id(rule))
            .collect::<Result<Vec<_>, _>>()
            .map_err(AdapterError::InvalidRule)?;
        for id in &ids {
            self.delete_by_id(section, ptype, id).await?;
        }
        Ok(())
    }

    async fn delete_by_id(&self, section: &str, ptype: &str, id: &str) -> AdapterResult<()> {
        let outcome = self
            .store
            .delete_document(&self.index, id, Refresh::Immediate)
            .await?;
        metrics::counter!("policy_adapter_writes_total", "operation" => "remove").increment(1);
        if outcome == DeleteOutcome::NotFound {
            tracing::debug!(section, ptype, document_id = %id, "policy already absent");
        }
        Ok(())
    }

    /// Delete every `ptype` document whose fields starting at `field_index`
    /// equal `field_values`. Empty values match anything. Returns the number of
    /// documents removed.
    pub async fn remove_filtered_policy(
        &self,
        section: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<u64> {
        if ptype.is_empty() {
            return Err(AdapterError::InvalidRule("ptype must not be empty".to_string()));
        }
        let Some(end) = field_index
            .checked_add(field_values.len())
            .filter(|end| *end <= MAX_FIELDS)
        else {
            return Err(AdapterError::InvalidRule(format!(
                "filter starting at field {field_index} with {} value(s) exceeds v{}",
                field_values.len(),
                MAX_FIELDS - 1
            )));
        };
        let mut terms = vec![("ptype".to_string(), ptype.to_string())];
        terms.extend(
            FIELD_NAMES[field_index..end]
                .iter()
                .zip(field_values)
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, value)| (name.to_string(), value.clone())),
        );
        let deleted = self
            .store
            .delete_by_query(&self.index, &Query::Terms(terms), Refresh::Immediate)
            .await?;
        metrics::counter!("policy_adapter_writes_total", "operation" => "remove_filtered")
            .increment(1);
        tracing::debug!(section, ptype, field_index, deleted, "filtered policies removed");
        Ok(deleted)
    }

    /// Append every stored rule to `model`. On error `model` may be partially
    /// filled and should be discarded.
    pub async fn load_policy(&self, model: &mut PolicyModel) -> AdapterResult<LoadReport> {
        let started = std::time::Instant::now();
        let result = ScrollLoader::new(self.store.as_ref(), &self.index, self.options)
            .load_into(model)
            .await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("policy_adapter_loads_total", "outcome" => outcome).increment(1);
        metrics::histogram!("policy_adapter_load_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    /// Replace the stored policy with `model`. Returns the number of rules written.
    pub async fn save_policy(&self, model: &PolicyModel) -> AdapterResult<usize> {
        self.clear_policy().await?;
        let mut written = 0;
        for (section, ptype, rules) in model.iter() {
            for rule in rules {
                self.add_policy(section, ptype, rule).await?;
                written += 1;
            }
        }
        tracing::info!(index = %self.index, written, "policy saved");
        Ok(written)
    }

    /// Delete every document in the policy index.
    pub async fn clear_policy(&self) -> AdapterResult<u64> {
        let deleted = self
            .store
            .delete_by_query(&self.index, &Query::MatchAll, Refresh::Immediate)
            .await?;
        metrics::counter!("policy_adapter_writes_total", "operation" => "clear").increment(1);
        Ok(deleted)
    }
}
