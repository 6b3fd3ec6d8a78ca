use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore, DecodedKey, Mutator};
use crate::config::EngineConfig;
use crate::filter::{FilterProvider, OrderDefinition, RowFilter, parse_order_by_key};
use crate::mutate::{MutationError, PatchContext, RevalidateOpts, RowChange, RowMerger, RowMutator, RowTransformer};

/// A change to one row of `schema.table`, propagated to every cached query.
#[derive(Clone)]
pub struct ItemMutation {
    pub schema: String,
    pub table: String,
    /// The row (or its primary keys plus changed fields), keyed by column.
    pub input: Value,
    pub primary_keys: Vec<String>,
    pub change: RowChange,
    pub transformer: Option<RowTransformer>,
    pub revalidate: RevalidateOpts,
}

impl ItemMutation {
    fn with_change(schema: &str, table: &str, input: Value, primary_keys: &[&str], change: RowChange) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            input,
            primary_keys: primary_keys.iter().map(|pk| pk.to_string()).collect(),
            change,
            transformer: None,
            revalidate: RevalidateOpts::default(),
        }
    }

    pub fn mutate(schema: &str, table: &str, input: Value, primary_keys: &[&str], mutate: RowMutator) -> Self {
        Self::with_change(schema, table, input, primary_keys, RowChange::Mutate(mutate))
    }

    pub fn upsert(schema: &str, table: &str, input: Value, primary_keys: &[&str], merge: Option<RowMerger>) -> Self {
        Self::with_change(schema, table, input, primary_keys, RowChange::Upsert { merge })
    }

    pub fn delete(schema: &str, table: &str, input: Value, primary_keys: &[&str]) -> Self {
        Self::with_change(schema, table, input, primary_keys, RowChange::Delete)
    }

    pub fn with_transformer(mut self, transformer: RowTransformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_revalidate(mut self, revalidate: RevalidateOpts) -> Self {
        self.revalidate = revalidate;
        self
    }
}

/// The cache a mutation is applied to.
pub struct MutateItemCache<S: CacheStore> {
    pub store: Arc<S>,
    pub filters: Arc<dyn FilterProvider>,
    pub config: EngineConfig,
}

impl<S: CacheStore> MutateItemCache<S> {
    pub fn new(store: Arc<S>, filters: Arc<dyn FilterProvider>, config: EngineConfig) -> Self {
        Self { store, filters, config }
    }
}

/// How many per-key operations a mutation scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationOutcome {
    pub patched: usize,
    pub revalidated: usize,
}

enum KeyTask {
    Patch(Mutator),
    Revalidate,
}

/// Applies `op` to every cached query it affects.
///
/// Keys that do not decode or target another table are skipped, unless a
/// revalidation rule names them. Keys whose rows cannot be checked locally
/// (head requests, wildcard or aggregate selections, unparsable filters or
/// ordering) are revalidated instead of patched. All per-key operations run
/// concurrently and are all awaited; the first failure is returned once
/// every one of them has settled.
pub async fn mutate_item<S: CacheStore>(op: &ItemMutation, cache: &MutateItemCache<S>) -> Result<MutationOutcome, MutationError> {
    let mut scheduled: Vec<(S::Key, KeyTask)> = vec![];

    for key in cache.store.cache_keys() {
        let Some(decoded) = cache.store.decode(&key) else {
            continue;
        };

        let filter = match cache.filters.filter_for(&decoded.query_key) {
            Ok(filter) => Some(filter),
            Err(err) => {
                debug!(key = ?key, error = %err, "no row filter for cache key");
                None
            }
        };

        if decoded.schema == op.schema && decoded.table == op.table {
            if let Some(task) = plan_key(op, &decoded, filter.as_ref(), &cache.config) {
                scheduled.push((key.clone(), task));
            }
        }

        if op.revalidate.should_revalidate_table(&decoded, &cache.config)
            || op.revalidate.should_revalidate_relation(&op.input, &decoded, filter.as_deref(), &cache.config)
        {
            scheduled.push((key.clone(), KeyTask::Revalidate));
        }
    }

    let mut outcome = MutationOutcome::default();
    let mut tasks: JoinSet<Result<(), CacheError>> = JoinSet::new();
    for (key, task) in scheduled {
        let store = cache.store.clone();
        match task {
            KeyTask::Patch(mutator) => {
                outcome.patched += 1;
                tasks.spawn(async move { store.mutate(&key, mutator).await });
            }
            KeyTask::Revalidate => {
                outcome.revalidated += 1;
                tasks.spawn(async move { store.revalidate(&key).await });
            }
        }
    }

    let mut first_error: Option<MutationError> = None;
    while let Some(joined) = tasks.join_next().await {
        let error = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => MutationError::from(err),
            Err(err) => MutationError::Task(err.to_string()),
        };
        warn!(table = %op.table, error = %error, "cache operation failed");
        if first_error.is_none() {
            first_error = Some(error);
        }
    }

    debug!(
        schema = %op.schema,
        table = %op.table,
        patched = outcome.patched,
        revalidated = outcome.revalidated,
        "item mutation applied"
    );

    match first_error {
        Some(error) => Err(error),
        None => Ok(outcome),
    }
}

/// Patch or revalidate for a key on the mutated table, `None` to leave it.
fn plan_key(
    op: &ItemMutation,
    decoded: &DecodedKey,
    filter: Option<&Arc<dyn RowFilter>>,
    config: &EngineConfig,
) -> Option<KeyTask> {
    let Some(filter) = filter else {
        return Some(KeyTask::Revalidate);
    };

    let input = filter.denormalize(&op.input);
    let has_primary_keys = op
        .primary_keys
        .iter()
        .all(|pk| input.get(pk).is_some());
    if !has_primary_keys {
        debug!(query_key = %decoded.query_key, "mutation input misses a primary key for this query");
        return None;
    }
    if filter.has_filters_on_paths(&op.primary_keys) && !filter.apply_filters_on_paths(&input, &op.primary_keys) {
        return None;
    }

    if decoded.is_head || filter.has_wildcard_path() || filter.has_aggregate_path() {
        return Some(KeyTask::Revalidate);
    }

    let order_by: Vec<OrderDefinition> = match decoded.order_by_key.as_deref().map(parse_order_by_key) {
        None => vec![],
        Some(Ok(order_by)) => order_by,
        Some(Err(err)) => {
            warn!(query_key = %decoded.query_key, error = %err, "invalid order by key, revalidating");
            return Some(KeyTask::Revalidate);
        }
    };

    let limit = decoded.limit.unwrap_or(config.default_limit);
    let filter = filter.clone();
    let change = op.change.clone();
    let primary_keys = op.primary_keys.clone();
    let transformer = op.transformer.clone();

    let mutator: Mutator = Box::new(move |current| {
        let ctx = PatchContext {
            primary_keys: &primary_keys,
            filter: &*filter,
            order_by: &order_by,
            transformer: transformer.as_deref(),
        };
        current.map(|data| change.apply(&input, data, limit, &ctx))
    });
    Some(KeyTask::Patch(mutator))
}
