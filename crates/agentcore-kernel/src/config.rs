//! Environment knobs (§6), loaded as layered JSON the way the teacher's own
//! config store does it: global < project < managed < env < runtime < cli,
//! each layer deep-merged over the previous one. Unlike the teacher this
//! layer has nothing to do with provider credentials or workspace scrubbing
//! — it exists purely to resolve the kernel's own tunables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::fs;
use tokio::sync::RwLock;

use agentcore_economics::BudgetConfig;
use agentcore_types::EnforcementMode;

/// §6 environment knobs with their documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KernelConfig {
    pub enforcement_mode: EnforcementMode,
    pub max_tokens: u64,
    pub soft_token_limit: u64,
    pub max_cost: f64,
    pub soft_cost_limit: f64,
    pub max_iterations: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_requests: u32,
    pub request_timeout_ms: u64,
    pub max_checkpoints: usize,
    pub auto_checkpoint: bool,
    pub confirm_before_execute: bool,
    pub auto_pause_at_decisions: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            enforcement_mode: EnforcementMode::Strict,
            max_tokens: 200_000,
            soft_token_limit: 150_000,
            max_cost: 10.0,
            soft_cost_limit: 7.5,
            max_iterations: 100,
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            half_open_requests: 1,
            request_timeout_ms: 60_000,
            max_checkpoints: 20,
            auto_checkpoint: true,
            confirm_before_execute: true,
            auto_pause_at_decisions: true,
        }
    }
}

impl KernelConfig {
    pub fn budget_config(&self) -> BudgetConfig {
        BudgetConfig {
            enforcement_mode: self.enforcement_mode,
            max_tokens: self.max_tokens,
            soft_token_limit: self.soft_token_limit,
            max_cost: self.max_cost,
            soft_cost_limit: self.soft_cost_limit,
            max_iterations: self.max_iterations,
        }
    }

    pub fn reset_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default)]
struct ConfigLayers {
    global: Value,
    project: Value,
    env: Value,
    cli: Value,
}

fn empty_object() -> Value {
    json!({})
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

async fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Knobs read from `AGENTCORE_*` environment variables, applied between the
/// on-disk layers and any CLI-supplied overrides (§6).
fn env_layer() -> Value {
    let mut map = serde_json::Map::new();
    if let Ok(v) = std::env::var("AGENTCORE_ENFORCEMENT_MODE") {
        map.insert("enforcementMode".to_string(), json!(v));
    }
    if let Ok(v) = std::env::var("AGENTCORE_MAX_TOKENS").ok().and_then(|s| s.parse::<u64>().ok()) {
        map.insert("maxTokens".to_string(), json!(v));
    }
    if let Ok(v) = std::env::var("AGENTCORE_MAX_COST").ok().and_then(|s| s.parse::<f64>().ok()) {
        map.insert("maxCost".to_string(), json!(v));
    }
    if let Ok(v) = std::env::var("AGENTCORE_MAX_ITERATIONS").ok().and_then(|s| s.parse::<u32>().ok()) {
        map.insert("maxIterations".to_string(), json!(v));
    }
    Value::Object(map)
}

/// Layered config store, grounded on the teacher's `ConfigStore`: project
/// file < global file < env vars < explicit CLI overrides, deep-merged in
/// that order so the most specific layer wins per key.
#[derive(Clone)]
pub struct ConfigStore {
    project_path: PathBuf,
    layers: Arc<RwLock<ConfigLayers>>,
}

impl ConfigStore {
    pub async fn load(project_path: impl Into<PathBuf>, cli_overrides: Option<Value>) -> anyhow::Result<Self> {
        let project_path = project_path.into();
        if let Some(parent) = project_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let global_path = dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentcore")
            .join("config.json");
        if let Some(parent) = global_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let global = read_json_file(&global_path).await.unwrap_or_else(|_| empty_object());
        let project = read_json_file(&project_path).await.unwrap_or_else(|_| empty_object());

        let layers = ConfigLayers { global, project, env: env_layer(), cli: cli_overrides.unwrap_or_else(empty_object) };

        Ok(Self { project_path, layers: Arc::new(RwLock::new(layers)) })
    }

    pub async fn effective(&self) -> KernelConfig {
        let layers = self.layers.read().await.clone();
        let mut merged = empty_object();
        deep_merge(&mut merged, &layers.global);
        deep_merge(&mut merged, &layers.project);
        deep_merge(&mut merged, &layers.env);
        deep_merge(&mut merged, &layers.cli);
        serde_json::from_value(merged).unwrap_or_default()
    }

    pub async fn set_project_value(&self, patch: Value) -> anyhow::Result<()> {
        let mut layers = self.layers.write().await;
        deep_merge(&mut layers.project, &patch);
        let payload = serde_json::to_string_pretty(&layers.project)?;
        fs::write(&self.project_path, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn defaults_apply_when_no_files_exist() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("agentcore.json"), None).await.unwrap();
        let cfg = store.effective().await;
        assert_eq!(cfg.max_tokens, 200_000);
        assert_eq!(cfg.enforcement_mode, EnforcementMode::Strict);
    }

    #[tokio::test]
    async fn cli_overrides_win_over_project_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(dir.path().join("agentcore.json"), Some(json!({ "maxTokens": 50_000 }))).await.unwrap();
        store.set_project_value(json!({ "maxTokens": 10_000, "maxIterations": 42 })).await.unwrap();

        let cfg = store.effective().await;
        assert_eq!(cfg.max_tokens, 50_000);
        assert_eq!(cfg.max_iterations, 42);
    }
}
