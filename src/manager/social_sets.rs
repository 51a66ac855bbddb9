use crate::client::v2::SocialSet;
use std::collections::HashMap;

/// Name/username/id lookup over the social sets of one account.
#[derive(Debug, Clone, Default)]
pub struct SocialSetDirectory {
    sets: Vec<SocialSet>,
    by_key: HashMap<String, String>,
}

impl SocialSetDirectory {
    pub fn new(sets: Vec<SocialSet>) -> Self {
        let mut by_key = HashMap::new();
        for set in &sets {
            // ids first so a name can never shadow another set's id
            by_key.insert(set.id.clone(), set.id.clone());
        }
        for set in &sets {
            for key in [set.name.as_deref(), set.username.as_deref()]
                .into_iter()
                .flatten()
            {
                by_key
                    .entry(normalize(key))
                    .or_insert_with(|| set.id.clone());
            }
        }
        Self { sets, by_key }
    }

    /// Id for a name, `@username`, or id. Matching is case-insensitive.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.by_key
            .get(key.trim())
            .or_else(|| self.by_key.get(&normalize(key)))
            .map(String::as_str)
    }

    pub fn sets(&self) -> &[SocialSet] {
        &self.sets
    }

    pub fn names(&self) -> Vec<String> {
        self.sets
            .iter()
            .map(|set| set.display_name().to_string())
            .collect()
    }
}

fn normalize(key: &str) -> String {
    key.trim().trim_start_matches('@').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn set(id: &str, name: Option<&str>, username: Option<&str>) -> SocialSet {
        SocialSet {
            id: id.into(),
            name: name.map(Into::into),
            username: username.map(Into::into),
            profile_image_url: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn resolves_by_name_username_and_id() {
        let directory = SocialSetDirectory::new(vec![
            set("17", Some("Brand"), Some("brandhq")),
            set("18", None, Some("Founder")),
        ]);
        assert_eq!(directory.resolve("brand"), Some("17"));
        assert_eq!(directory.resolve("@BrandHQ"), Some("17"));
        assert_eq!(directory.resolve(" founder "), Some("18"));
        assert_eq!(directory.resolve("18"), Some("18"));
        assert_eq!(directory.resolve("missing"), None);
        assert_eq!(directory.names(), vec!["Brand", "Founder"]);
    }

    #[test]
    fn names_do_not_shadow_ids() {
        let directory = SocialSetDirectory::new(vec![
            set("17", Some("18"), None),
            set("18", Some("Other"), None),
        ]);
        assert_eq!(directory.resolve("18"), Some("18"));
    }
}
