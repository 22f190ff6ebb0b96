//! Product catalog index and its TTL cache.
//!
//! Stop-list and sales rows sometimes carry nothing but an opaque product
//! identifier; the index maps every identifier the backends use (id, sku,
//! code, article) to a name, group and price. Menus change rarely, so the
//! cache tolerates staleness: a failed refresh serves the previous copy.

use crate::types::{ProductInfo, Row};
use crate::utils::{Logger, RestoError, RestoResult};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    by_key: HashMap<String, ProductInfo>,
}

impl ProductIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keys: &[String], info: ProductInfo) {
        for key in keys {
            if !key.is_empty() {
                self.by_key.insert(key.clone(), info.clone());
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&ProductInfo> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Builds the index from the cloud nomenclature payload: products with
    /// their parent group names and first listed price.
    pub fn from_nomenclature(payload: &Value) -> ProductIndex {
        let mut index = ProductIndex::new();

        let groups: HashMap<String, String> = payload
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| {
                        let id = g.get("id").and_then(Value::as_str)?;
                        let name = g.get("name").and_then(Value::as_str).unwrap_or("");
                        Some((id.to_string(), name.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let products = payload
            .get("products")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for product in &products {
            let name = product
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let group = product
                .get("parentGroup")
                .and_then(Value::as_str)
                .and_then(|id| groups.get(id))
                .cloned()
                .unwrap_or_default();
            let price = product
                .get("sizePrices")
                .and_then(Value::as_array)
                .and_then(|sizes| sizes.first())
                .and_then(|size| size.get("price"))
                .and_then(|price| price.get("currentPrice"))
                .and_then(Value::as_f64);

            let mut keys = Vec::new();
            for key_field in ["id", "code", "sku", "article"] {
                if let Some(key) = product.get(key_field).and_then(Value::as_str) {
                    if !key.is_empty() {
                        keys.push(key.to_string());
                    }
                }
            }
            if keys.is_empty() {
                continue;
            }
            index.insert(&keys, ProductInfo {
                name: name.to_string(),
                group,
                price,
            });
        }
        index
    }

    /// Builds the index from the on-prem product list (already reduced to
    /// key-set/info pairs by the client).
    pub fn from_pairs(pairs: Vec<(Vec<String>, ProductInfo)>) -> ProductIndex {
        let mut index = ProductIndex::new();
        for (keys, info) in pairs {
            index.insert(&keys, info);
        }
        index
    }

    /// Convenience for rows already normalized elsewhere.
    pub fn row_key(row: &Row, field: &str) -> Option<String> {
        row.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CatalogCacheConfig {
    pub ttl_seconds: i64,
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 1800 }
    }
}

impl CatalogCacheConfig {
    pub fn validate(&self) -> RestoResult<()> {
        if self.ttl_seconds <= 0 {
            return Err(RestoError::config_error(
                "catalog ttl_seconds must be greater than 0",
            ));
        }
        Ok(())
    }
}

struct CachedIndex {
    index: Arc<ProductIndex>,
    fetched_at: DateTime<Utc>,
}

pub struct CatalogCache {
    config: CatalogCacheConfig,
    state: RwLock<Option<CachedIndex>>,
    logger: Logger,
}

impl CatalogCache {
    pub fn new(config: CatalogCacheConfig) -> RestoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(None),
            logger: Logger::named("catalog"),
        })
    }

    /// Returns the cached index, refreshing it when past TTL. A failing
    /// refresh falls back to the stale copy when one exists.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> RestoResult<Arc<ProductIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RestoResult<ProductIndex>>,
    {
        let ttl = Duration::seconds(self.config.ttl_seconds);

        {
            let state = self.state.read().await;
            if let Some(cached) = state.as_ref() {
                if Utc::now() - cached.fetched_at < ttl {
                    return Ok(cached.index.clone());
                }
            }
        }

        let mut state = self.state.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = state.as_ref() {
            if Utc::now() - cached.fetched_at < ttl {
                return Ok(cached.index.clone());
            }
        }

        match refresh().await {
            Ok(index) => {
                self.logger
                    .info(&format!("catalog refreshed: {} keys", index.len()));
                let index = Arc::new(index);
                *state = Some(CachedIndex {
                    index: index.clone(),
                    fetched_at: Utc::now(),
                });
                Ok(index)
            }
            Err(err) => {
                if let Some(cached) = state.as_ref() {
                    self.logger.warn(&format!(
                        "catalog refresh failed, serving stale copy: {}",
                        err
                    ));
                    return Ok(cached.index.clone());
                }
                Err(err)
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }
}
