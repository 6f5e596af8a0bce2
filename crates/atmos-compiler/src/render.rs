//! Template evaluation over a resolved component tree (steps 5
//! and 6: expand `{{ }}`/custom functions, then stamp `computed`
//! provenance for every leaf a template actually produced).

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use atmos_provenance::{Position, ProvenanceEntry, ProvenanceKey, ProvenanceKind, ProvenanceStore};
use atmos_template::TemplateEngine;
use atmos_types::{AuthContext, ComponentConfig, Value};

struct ComponentRenderCtx<'a> {
    stack: &'a str,
    kind: &'a str,
    name: &'a str,
    vars: &'a Value,
    engine: &'a TemplateEngine,
    auth: Option<&'a AuthContext>,
}

impl ComponentRenderCtx<'_> {
    fn render(&self, value: &Value, path: &str, store: &mut ProvenanceStore) -> Result<Value> {
        match value {
            Value::String(s) => {
                let rendered = self.engine.render_string(s, self.vars, self.auth)?;
                if is_templated(s) {
                    store.record(
                        ProvenanceKey::new(self.stack, self.kind, self.name, path.to_string()),
                        ProvenanceEntry::new(
                            Position::new(format!("{}/{}/{}", self.stack, self.kind, self.name), 0, 0),
                            ProvenanceKind::Computed,
                            0,
                        ),
                    );
                }
                Ok(rendered)
            }
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    let child_path = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                    out.insert(k.clone(), self.render(v, &child_path, store)?);
                }
                Ok(Value::Map(out))
            }
            Value::List(items) => {
                let out = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.render(item, &format!("{path}[{i}]"), store))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(out))
            }
            other => Ok(other.clone()),
        }
    }
}

fn is_templated(s: &str) -> bool {
    s.contains("{{") || s.starts_with('!')
}

/// Render every templated leaf of a resolved component's raw value tree and
/// materialize it into a [`ComponentConfig`].
#[allow(clippy::too_many_arguments)]
pub fn render_component(
    stack: &str,
    kind: &str,
    name: &str,
    raw: &Value,
    vars: &Value,
    engine: &TemplateEngine,
    auth: Option<&AuthContext>,
    store: &mut ProvenanceStore,
) -> Result<ComponentConfig> {
    let ctx = ComponentRenderCtx { stack, kind, name, vars, engine, auth };
    let rendered = ctx
        .render(raw, "", store)
        .with_context(|| format!("while rendering templates for {stack}/{kind}/{name}"))?;
    value_to_component_config(&rendered)
        .with_context(|| format!("{stack}/{kind}/{name} does not match the component config shape"))
}

fn value_to_component_config(value: &Value) -> Result<ComponentConfig> {
    let json = serde_json::to_value(value).context("failed to convert rendered component to JSON")?;
    serde_json::from_value(json).context("rendered component does not match ComponentConfig shape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_types::Number;

    fn ctx_engine() -> TemplateEngine {
        TemplateEngine::new(".")
    }

    #[test]
    fn plain_values_pass_through_unchanged_with_no_computed_provenance() {
        let mut raw = BTreeMap::new();
        raw.insert("vars".to_string(), {
            let mut vars = BTreeMap::new();
            vars.insert("cidr".to_string(), Value::String("10.0.0.0/16".to_string()));
            vars.insert("count".to_string(), Value::Number(Number::Int(3)));
            Value::Map(vars)
        });
        let raw = Value::Map(raw);

        let engine = ctx_engine();
        let mut store = ProvenanceStore::new();
        let config =
            render_component("prod", "terraform", "vpc", &raw, &Value::Null, &engine, None, &mut store).unwrap();

        assert_eq!(config.vars.get("cidr"), Some(&Value::String("10.0.0.0/16".to_string())));
        assert!(store.is_empty());
    }

    #[test]
    fn templated_leaf_is_expanded_and_stamped_computed() {
        let mut steps = BTreeMap::new();
        steps.insert("env".to_string(), {
            let mut step = BTreeMap::new();
            step.insert("value".to_string(), Value::String("prod".to_string()));
            Value::Map(step)
        });
        let mut vars_ctx = BTreeMap::new();
        vars_ctx.insert("steps".to_string(), Value::Map(steps));
        let vars = Value::Map(vars_ctx);

        let mut raw = BTreeMap::new();
        raw.insert("vars".to_string(), {
            let mut v = BTreeMap::new();
            v.insert("stage".to_string(), Value::String("{{ steps.env.value }}".to_string()));
            Value::Map(v)
        });
        let raw = Value::Map(raw);

        let engine = ctx_engine();
        let mut store = ProvenanceStore::new();
        let config = render_component("prod", "terraform", "vpc", &raw, &vars, &engine, None, &mut store).unwrap();

        assert_eq!(config.vars.get("stage"), Some(&Value::String("prod".to_string())));
        let key = atmos_provenance::ProvenanceKey::new("prod", "terraform", "vpc", "vars.stage");
        let entry = store.latest(&key).unwrap();
        assert_eq!(entry.kind, ProvenanceKind::Computed);
    }
}
