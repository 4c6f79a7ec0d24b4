//! In-memory resource registry.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::lifecycle::init::{InitError, Initializer};
use crate::resources::{Resource, ResourceError, ResourceRequest, ResourceService, ResourceStatus};

/// Resource types known to every host.
pub const BUILTIN_TYPES: &[&str] = &["certificate", "dns", "mail"];

/// Resource registry backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryResourceService {
    types: DashSet<String>,
    /// resource type → providing application
    providers: DashMap<String, String>,
    resources: DashMap<String, Resource>,
}

impl MemoryResourceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, kind: &str) {
        self.types.insert(kind.to_string());
    }

    fn provider_of(&self, kind: &str) -> Option<String> {
        self.providers.get(kind).map(|p| p.value().clone())
    }

    fn provided_by(&self, app: &str) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.value() == app)
            .map(|p| p.key().clone())
            .collect()
    }
}

impl ResourceService for MemoryResourceService {
    fn app_resources(&self, app: &str) -> Vec<Resource> {
        self.resources
            .iter()
            .filter(|r| r.app == app)
            .map(|r| r.value().clone())
            .collect()
    }

    fn all_resources(&self) -> Vec<Resource> {
        self.resources.iter().map(|r| r.value().clone()).collect()
    }

    fn create(&self, app: &str, request: ResourceRequest) -> Result<Resource, ResourceError> {
        if !self.types.contains(&request.kind) {
            return Err(ResourceError::UnknownType(request.kind));
        }
        let resource = Resource {
            id: Uuid::new_v4().to_string(),
            kind: request.kind,
            value: request.value,
            app: app.to_string(),
            status: ResourceStatus::Requested,
        };
        self.resources.insert(resource.id.clone(), resource.clone());
        tracing::info!(app, id = %resource.id, kind = %resource.kind, "Resource created");
        Ok(resource)
    }

    fn get(&self, app: &str, id: &str) -> Result<Resource, ResourceError> {
        let resource = self
            .resources
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;
        if resource.app != app && self.provider_of(&resource.kind).as_deref() != Some(app) {
            return Err(ResourceError::NotOwner {
                app: app.to_string(),
                id: id.to_string(),
            });
        }
        Ok(resource)
    }

    fn delete(&self, app: &str, id: &str) -> Result<Resource, ResourceError> {
        let removed = self
            .resources
            .remove_if(id, |_, r| r.app == app)
            .map(|(_, r)| r);
        match removed {
            Some(resource) => {
                tracing::info!(app, id, "Resource deleted");
                Ok(resource)
            }
            None if self.resources.contains_key(id) => Err(ResourceError::NotOwner {
                app: app.to_string(),
                id: id.to_string(),
            }),
            None => Err(ResourceError::NotFound(id.to_string())),
        }
    }

    fn set_status(
        &self,
        app: &str,
        id: &str,
        status: ResourceStatus,
    ) -> Result<Resource, ResourceError> {
        let mut resource = self
            .resources
            .get_mut(id)
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;
        if self.provider_of(&resource.kind).as_deref() != Some(app) {
            return Err(ResourceError::NotProvider(app.to_string()));
        }
        resource.status = status;
        tracing::info!(app, id, %status, "Resource status updated");
        Ok(resource.clone())
    }

    fn register_provider(&self, app: &str, kind: &str) -> Result<(), ResourceError> {
        if !self.types.contains(kind) {
            return Err(ResourceError::UnknownType(kind.to_string()));
        }
        let entry = self
            .providers
            .entry(kind.to_string())
            .or_insert_with(|| app.to_string());
        if entry.value() != app {
            return Err(ResourceError::ProviderExists {
                kind: kind.to_string(),
                app: entry.value().clone(),
            });
        }
        tracing::info!(app, kind, "Resource provider registered");
        Ok(())
    }

    fn deregister_provider(&self, app: &str, kind: &str) -> Result<(), ResourceError> {
        match self.providers.remove_if(kind, |_, owner| owner == app) {
            Some(_) => {
                tracing::info!(app, kind, "Resource provider deregistered");
                Ok(())
            }
            None => Err(ResourceError::NotProvider(app.to_string())),
        }
    }

    fn provider_resources(&self, app: &str) -> Result<Vec<Resource>, ResourceError> {
        let kinds = self.provided_by(app);
        if kinds.is_empty() {
            return Err(ResourceError::NotProvider(app.to_string()));
        }
        Ok(self
            .resources
            .iter()
            .filter(|r| kinds.contains(&r.kind))
            .map(|r| r.value().clone())
            .collect())
    }
}

/// Startup step registering the built-in resource types.
pub struct ResourceTypeRegistry(pub Arc<MemoryResourceService>);

impl Initializer for ResourceTypeRegistry {
    fn name(&self) -> &str {
        "resource-type registry"
    }

    fn initialize(&self) -> Result<(), InitError> {
        for kind in BUILTIN_TYPES {
            self.0.register_type(kind);
        }
        Ok(())
    }
}

/// Startup step for the provider registry; resource types must already exist.
pub struct ProviderRegistry(pub Arc<MemoryResourceService>);

impl Initializer for ProviderRegistry {
    fn name(&self) -> &str {
        "provider registry"
    }

    fn initialize(&self) -> Result<(), InitError> {
        if self.0.types.is_empty() {
            return Err(InitError::new(self.name(), ResourceError::NotInitialized));
        }
        tracing::debug!(providers = self.0.providers.len(), "Provider registry loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> Arc<MemoryResourceService> {
        let svc = Arc::new(MemoryResourceService::new());
        ResourceTypeRegistry(svc.clone()).initialize().unwrap();
        svc
    }

    fn dns_request() -> ResourceRequest {
        ResourceRequest {
            kind: "dns".into(),
            value: json!({"host": "www"}),
        }
    }

    #[test]
    fn providers_need_types_first() {
        let svc = Arc::new(MemoryResourceService::new());
        assert!(ProviderRegistry(svc.clone()).initialize().is_err());
        ResourceTypeRegistry(svc.clone()).initialize().unwrap();
        assert!(ProviderRegistry(svc).initialize().is_ok());
    }

    #[test]
    fn create_and_list_own() {
        let svc = service();
        let created = svc.create("blog", dns_request()).unwrap();
        assert_eq!(created.status, ResourceStatus::Requested);
        assert_eq!(svc.app_resources("blog"), vec![created.clone()]);
        assert!(svc.app_resources("shop").is_empty());
        assert_eq!(
            svc.create("blog", ResourceRequest { kind: "gpu".into(), value: json!(null) }),
            Err(ResourceError::UnknownType("gpu".into()))
        );
    }

    #[test]
    fn only_owner_deletes() {
        let svc = service();
        let created = svc.create("blog", dns_request()).unwrap();
        assert!(matches!(
            svc.delete("shop", &created.id),
            Err(ResourceError::NotOwner { .. })
        ));
        svc.delete("blog", &created.id).unwrap();
        assert_eq!(
            svc.delete("blog", &created.id),
            Err(ResourceError::NotFound(created.id))
        );
    }

    #[test]
    fn provider_flow() {
        let svc = service();
        let created = svc.create("blog", dns_request()).unwrap();

        assert_eq!(
            svc.provider_resources("dns-app"),
            Err(ResourceError::NotProvider("dns-app".into()))
        );
        svc.register_provider("dns-app", "dns").unwrap();
        assert!(matches!(
            svc.register_provider("other", "dns"),
            Err(ResourceError::ProviderExists { .. })
        ));

        assert_eq!(svc.provider_resources("dns-app").unwrap().len(), 1);
        assert_eq!(svc.get("dns-app", &created.id).unwrap().id, created.id);

        let updated = svc
            .set_status("dns-app", &created.id, ResourceStatus::Created)
            .unwrap();
        assert_eq!(updated.status, ResourceStatus::Created);
        assert_eq!(
            svc.set_status("blog", &created.id, ResourceStatus::Unknown),
            Err(ResourceError::NotProvider("blog".into()))
        );

        svc.deregister_provider("dns-app", "dns").unwrap();
        assert!(svc.deregister_provider("dns-app", "dns").is_err());
    }
}
