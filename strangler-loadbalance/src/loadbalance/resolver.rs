use super::registry::EndpointRegistry;
use strangler_core::Endpoint;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 一个服务名解析出的端点集合
///
/// 同一个服务名每次解析返回同一个 `Arc`，选择器靠指针相等判断集合是否变化。
pub type EndpointSet = Arc<[Arc<Endpoint>]>;

/// 服务组解析器：逻辑服务名 -> 物理端点集合
///
/// 不看健康状态，健康过滤由选择器负责。
#[derive(Debug)]
pub struct ServiceGroupResolver {
    registry: Arc<EndpointRegistry>,
    groups: BTreeMap<String, Vec<String>>,
    resolved: HashMap<String, EndpointSet>,
}

impl ServiceGroupResolver {
    /// `known_names` 中的服务名在构造时解析并缓存
    pub fn new<I>(registry: Arc<EndpointRegistry>, groups: BTreeMap<String, Vec<String>>, known_names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut resolver = Self {
            registry,
            groups,
            resolved: HashMap::new(),
        };

        let names: Vec<String> = resolver
            .groups
            .keys()
            .cloned()
            .chain(known_names)
            .collect();
        for name in names {
            if !resolver.resolved.contains_key(&name) {
                let set = resolver.compute(&name);
                resolver.resolved.insert(name, set);
            }
        }

        resolver
    }

    pub fn resolve(&self, service_name: &str) -> EndpointSet {
        match self.resolved.get(service_name) {
            Some(set) => set.clone(),
            None => self.compute(service_name),
        }
    }

    /// 服务名对应的物理服务名，未配置的映射到自身
    pub fn members(&self, service_name: &str) -> Vec<String> {
        match self.groups.get(service_name) {
            Some(members) => members.clone(),
            None => vec![service_name.to_string()],
        }
    }

    fn compute(&self, service_name: &str) -> EndpointSet {
        let members = self.members(service_name);
        self.registry
            .endpoints()
            .iter()
            .filter(|endpoint| members.iter().any(|m| m == endpoint.service_name()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strangler_core::Protocol;

    fn create_test_resolver() -> ServiceGroupResolver {
        let registry = Arc::new(EndpointRegistry::new(vec![
            Endpoint::new("monolith-service", "monolith", 3280, Protocol::Http, "/health", 50),
            Endpoint::new("movies-service", "movies", 3281, Protocol::Http, "/api/movies", 50),
            Endpoint::new("events-service", "events", 3282, Protocol::Http, "/health", 100),
        ]));
        let mut groups = BTreeMap::new();
        groups.insert(
            "movies-load-balanced".to_string(),
            vec!["monolith-service".to_string(), "movies-service".to_string()],
        );
        ServiceGroupResolver::new(registry, groups, vec!["events-service".to_string()])
    }

    #[test]
    fn test_group_resolution() {
        let resolver = create_test_resolver();
        let set = resolver.resolve("movies-load-balanced");
        let names: Vec<&str> = set.iter().map(|e| e.service_name()).collect();
        assert_eq!(names, vec!["monolith-service", "movies-service"]);
    }

    #[test]
    fn test_self_mapping() {
        let resolver = create_test_resolver();
        let set = resolver.resolve("events-service");
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].service_name(), "events-service");

        // 不在缓存里的名字同样按自身解析
        let set = resolver.resolve("monolith-service");
        assert_eq!(set.len(), 1);

        assert!(resolver.resolve("ghost-service").is_empty());
    }

    #[test]
    fn test_resolution_ignores_health() {
        let resolver = create_test_resolver();
        let set = resolver.resolve("movies-load-balanced");
        set[0].record_probe(false, chrono::Utc::now());
        assert_eq!(resolver.resolve("movies-load-balanced").len(), 2);
    }

    #[test]
    fn test_cached_sets_keep_identity() {
        let resolver = create_test_resolver();
        let first = resolver.resolve("movies-load-balanced");
        let second = resolver.resolve("movies-load-balanced");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
