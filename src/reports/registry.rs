use crate::config::ReportsConfig;
use crate::reports::generator::{CommandGenerator, ReportGenerator};
use crate::reports::target::ReportTarget;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Report '{0}' is already registered")]
    DuplicateKey(String),
}

/// A report that can be requested from chat.
pub struct ReportDescriptor {
    pub key: String,
    pub display_name: String,
    pub file_name_prefix: String,
    /// File extension, also used as the upload type hint
    pub file_type: String,
    pub generator: Arc<dyn ReportGenerator>,
}

impl ReportDescriptor {
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        file_name_prefix: impl Into<String>,
        file_type: impl Into<String>,
        generator: Arc<dyn ReportGenerator>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            file_name_prefix: file_name_prefix.into(),
            file_type: file_type.into(),
            generator,
        }
    }

    /// Fresh, collision-free target for one run of this report.
    pub fn target_in(&self, dir: &Path) -> ReportTarget {
        ReportTarget::new(dir, &self.file_name_prefix, &self.file_type)
    }
}

impl fmt::Debug for ReportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDescriptor")
            .field("key", &self.key)
            .field("display_name", &self.display_name)
            .field("file_name_prefix", &self.file_name_prefix)
            .field("file_type", &self.file_type)
            .finish_non_exhaustive()
    }
}

/// Entry of a selection prompt. Serialized the way Slack select options are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOption {
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "value")]
    pub key: String,
}

/// Registered reports, in registration order. Built once at startup.
#[derive(Debug, Default)]
pub struct ReportRegistry {
    reports: Vec<Arc<ReportDescriptor>>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from `[[reports.definitions]]`, each backed by a
    /// command generator writing into the configured files directory.
    pub fn from_config(config: &ReportsConfig) -> Result<Self, RegistryError> {
        let files_dir = config.files_dir();
        let mut registry = Self::new();
        for def in &config.definitions {
            let generator = CommandGenerator::from_definition(def, files_dir.clone());
            registry.register(ReportDescriptor::new(
                def.key.clone(),
                def.name.clone(),
                def.prefix.clone(),
                def.file_type.clone(),
                Arc::new(generator),
            ))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ReportDescriptor) -> Result<(), RegistryError> {
        if self.reports.iter().any(|r| r.key == descriptor.key) {
            return Err(RegistryError::DuplicateKey(descriptor.key));
        }
        self.reports.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn list_available(&self) -> Vec<ReportOption> {
        self.reports
            .iter()
            .map(|r| ReportOption {
                label: r.display_name.clone(),
                key: r.key.clone(),
            })
            .collect()
    }

    pub fn resolve(&self, key: &str) -> Option<Arc<ReportDescriptor>> {
        self.reports.iter().find(|r| r.key == key).cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportDefinition;
    use async_trait::async_trait;

    struct NoopGenerator;

    #[async_trait]
    impl ReportGenerator for NoopGenerator {
        async fn generate(&self, _target: &ReportTarget) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn descriptor(key: &str, name: &str) -> ReportDescriptor {
        ReportDescriptor::new(key, name, key, "csv", Arc::new(NoopGenerator))
    }

    fn sample_registry() -> ReportRegistry {
        let mut registry = ReportRegistry::new();
        registry.register(descriptor("userActivity", "User Activity")).unwrap();
        registry.register(descriptor("signups", "Signups")).unwrap();
        registry.register(descriptor("churn", "Churn")).unwrap();
        registry
    }

    #[test]
    fn test_resolve_registered_keys() {
        let registry = sample_registry();
        for key in ["userActivity", "signups", "churn"] {
            let found = registry.resolve(key).expect("registered key resolves");
            assert_eq!(found.key, key);
        }
        assert_eq!(
            registry.resolve("signups").unwrap().display_name,
            "Signups"
        );
    }

    #[test]
    fn test_resolve_unknown_key_is_none() {
        let registry = sample_registry();
        assert!(registry.resolve("retiredReport").is_none());
        assert!(registry.resolve("").is_none());
        assert!(registry.resolve("useractivity").is_none());
    }

    #[test]
    fn test_list_available_preserves_order() {
        let registry = sample_registry();
        let options = registry.list_available();
        assert_eq!(
            options,
            vec![
                ReportOption { label: "User Activity".into(), key: "userActivity".into() },
                ReportOption { label: "Signups".into(), key: "signups".into() },
                ReportOption { label: "Churn".into(), key: "churn".into() },
            ]
        );
    }

    #[test]
    fn test_option_serializes_as_text_value() {
        let option = ReportOption { label: "User Activity".into(), key: "userActivity".into() };
        let json = serde_json::to_value(&option).unwrap();
        assert_eq!(json, serde_json::json!({"text": "User Activity", "value": "userActivity"}));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = sample_registry();
        let err = registry.register(descriptor("churn", "Churn again")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKey("churn".into()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_from_config() {
        let mut config = ReportsConfig::default();
        config.files_dir = "/var/reports".to_string();
        config.definitions.push(ReportDefinition {
            key: "signups".into(),
            name: "Signups".into(),
            prefix: "signups".into(),
            file_type: "xlsx".into(),
            command: "signups-report".into(),
            args: vec![],
            timeout_secs: 10,
        });

        let registry = ReportRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 2);
        let keys: Vec<String> = registry.list_available().into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["userActivity", "signups"]);

        let signups = registry.resolve("signups").unwrap();
        let target = signups.target_in(Path::new("/var/reports"));
        assert!(target.tmp_name.starts_with("signups_"));
        assert!(target.tmp_name.ends_with(".xlsx"));
    }
}
