// Actor profile directory backed by the `[profiles]` config table

use anyhow::Result;
use async_trait::async_trait;
use notifagg_engine::{ActorProfile, ProfileResolver};
use std::collections::BTreeMap;

pub struct DirectoryResolver {
    names: BTreeMap<String, String>,
}

impl DirectoryResolver {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl ProfileResolver for DirectoryResolver {
    async fn resolve_display_names(
        &self,
        actor_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ActorProfile>> {
        Ok(actor_ids
            .iter()
            .take(limit)
            .filter_map(|id| {
                self.names.get(id).map(|name| ActorProfile {
                    id: id.clone(),
                    display_name: name.clone(),
                    avatar_url: None,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_known_actors_within_limit() {
        let resolver = DirectoryResolver::new(BTreeMap::from([
            ("u1".to_string(), "Ada".to_string()),
            ("u3".to_string(), "Grace".to_string()),
        ]));
        let ids = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];

        let profiles = resolver.resolve_display_names(&ids, 2).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].display_name, "Ada");
    }
}
