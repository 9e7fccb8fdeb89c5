//! In-process harness that drives a [`ProviderService`] the way the host does.
//!
//! ```ignore
//! use hetzner_provider::testing::ProviderTester;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(HetznerProvider::new());
//! tester.configure(json!({"dns_api_token": "..."})).await?;
//! let zone = tester
//!     .apply("hetzner_dns_zone", None, json!({"name": "example.com", "ttl": 3600}))
//!     .await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Failure of a harness call.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider answered with error diagnostics.
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The provider call itself failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for diag in diagnostics {
        out.push_str("\n  ");
        out.push_str(&diag.summary);
        if let Some(detail) = &diag.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(attribute) = &diag.attribute {
            out.push_str(&format!(" (at {})", attribute));
        }
    }
    out
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Wraps a provider and exposes the host's call sequences.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`. Nothing is called until the first harness method.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider, for calls the harness does not sequence.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema, as GetSchema would return it.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Validate then configure, failing on any error diagnostic.
    ///
    /// Warnings, such as the one for a disabled DNS API, are returned.
    pub async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, TestError> {
        errors_only(self.provider.validate_provider_config(config.clone()).await?)?;
        let diagnostics = self.provider.configure(config).await?;
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(TestError::Diagnostics(diagnostics));
        }
        Ok(diagnostics)
    }

    /// Validate a resource configuration, failing on any error diagnostic.
    pub async fn validate_resource(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Validate a data source configuration, failing on any error diagnostic.
    pub async fn validate_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Plan `config` against `prior_state`, using `config` as both the
    /// proposed state and the raw configuration.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        config: Value,
    ) -> Result<PlanResult, TestError> {
        Ok(self
            .provider
            .plan(resource_type, prior_state, config.clone(), config)
            .await?)
    }

    /// Validate, plan and apply `config` on top of `prior_state`, then read
    /// the result back.
    ///
    /// A replacing plan deletes the prior object before creating the new one.
    pub async fn apply(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource(resource_type, config.clone()).await?;
        let plan = self.plan(resource_type, prior_state.clone(), config).await?;

        let state = match prior_state {
            None => {
                self.provider
                    .create(resource_type, plan.planned_state)
                    .await?
            }
            Some(prior) if plan.requires_replace => {
                self.provider.delete(resource_type, prior).await?;
                self.provider
                    .create(resource_type, plan.planned_state)
                    .await?
            }
            Some(prior) if !plan.changes.is_empty() => {
                self.provider
                    .update(resource_type, prior, plan.planned_state)
                    .await?
            }
            Some(prior) => prior,
        };
        Ok(self.provider.read(resource_type, state).await?)
    }

    /// Plan destruction and delete.
    ///
    /// A plan error stops the call before the delete.
    pub async fn destroy(&self, resource_type: &str, state: Value) -> Result<(), TestError> {
        self.provider
            .plan(resource_type, Some(state.clone()), Value::Null, Value::Null)
            .await?;
        Ok(self.provider.delete(resource_type, state).await?)
    }

    /// Import by id and refresh every imported object.
    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Vec<Value>, TestError> {
        let imported: Vec<ImportedResource> =
            self.provider.import_resource(resource_type, id).await?;
        let mut states = Vec::with_capacity(imported.len());
        for resource in imported {
            states.push(
                self.provider
                    .read(&resource.resource_type, resource.state)
                    .await?,
            );
        }
        Ok(states)
    }

    /// Validate and read a data source, returning the filled-in state.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_data_source(data_source_type, config.clone())
            .await?;
        Ok(self
            .provider
            .read_data_source(data_source_type, config)
            .await?)
    }
}

/// Panics unless at least one error diagnostic carries `text` in its summary
/// or detail.
pub fn assert_error_mentions(diagnostics: &[Diagnostic], text: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(text) || d.detail.as_deref().is_some_and(|detail| detail.contains(text))
    });
    assert!(
        found,
        "no error diagnostic mentions {:?}: {}",
        text,
        render_diagnostics(diagnostics)
    );
}

/// Panics unless the plan changes exactly the given attributes.
pub fn assert_plan_changes(plan: &PlanResult, paths: &[&str]) {
    let mut changed: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
    changed.sort_unstable();
    let mut expected = paths.to_vec();
    expected.sort_unstable();
    assert_eq!(changed, expected, "unexpected planned changes");
}
