//! A thread-safe cache of rewritten statements, keyed by the shape of the statement before
//! rewriting.
//!
//! Only rewrites which did not depend on the values bound to parameters are stored; a rewrite
//! which inspected a parameter value is recomputed for every execution.

use std::collections::HashMap;

use nullsem_errors::NullSemResult;
use nullsem_sql::ast::SelectExpression;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::nullability::SqlNullabilityProcessor;
use crate::options::NullSemanticsOptions;
use crate::parameters::ParameterValues;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    select: SelectExpression,
    use_relational_nulls: bool,
}

/// Rewritten statements, shared between any number of concurrent translations.
///
/// Each call to [`get_or_process`] on a miss runs its own [`SqlNullabilityProcessor`]; only the
/// map of finished rewrites is shared.
///
/// [`get_or_process`]: RewriteCache::get_or_process
#[derive(Debug, Default)]
pub struct RewriteCache {
    entries: RwLock<HashMap<CacheKey, SelectExpression>>,
    options: NullSemanticsOptions,
}

impl RewriteCache {
    pub fn new(options: NullSemanticsOptions) -> Self {
        Self {
            entries: Default::default(),
            options,
        }
    }

    pub fn options(&self) -> &NullSemanticsOptions {
        &self.options
    }

    /// Return the rewrite of `select` under `parameter_values`, from the cache if a previous
    /// rewrite of the same statement was independent of its parameter values
    pub fn get_or_process(
        &self,
        select: SelectExpression,
        parameter_values: &ParameterValues,
    ) -> NullSemResult<SelectExpression> {
        let key = CacheKey {
            select,
            use_relational_nulls: self.options.use_relational_nulls,
        };

        if !self.options.disable_rewrite_cache {
            if let Some(rewritten) = self.entries.read().get(&key) {
                trace!(select = %key.select, "rewrite cache hit");
                return Ok(rewritten.clone());
            }
            trace!(select = %key.select, "rewrite cache miss");
        }

        let processed = SqlNullabilityProcessor::new(&self.options, parameter_values)
            .process_select(key.select.clone())?;

        if self.options.disable_rewrite_cache {
            return Ok(processed.select);
        }
        if !processed.can_cache {
            debug!(select = %key.select, "rewrite depends on parameter values, not caching");
            return Ok(processed.select);
        }

        self.entries.write().insert(key, processed.select.clone());
        Ok(processed.select)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        debug!(entries = entries.len(), "clearing rewrite cache");
        entries.clear();
    }
}
