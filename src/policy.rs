use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use html5ever::LocalName;
use serde::{Deserialize, Serialize};

use crate::config::default;
use crate::error::{Error, Result};

/// Serializable form of a policy. Every field falls back to the default
/// tables, so a policy file only has to list what it changes.
///
/// ```toml
/// allowed_uri_schemes = ["http:", "https:", "mailto:", "pw:"]
/// max_depth = 64
///
/// [allowed_attributes]
/// "*" = ["class"]
/// a = ["href"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allowed_tags: Vec<String>,
    pub allowed_content_tags: Vec<String>,
    pub content_container: String,
    pub allowed_css_properties: Vec<String>,
    pub allowed_uri_schemes: Vec<String>,
    pub uri_attributes: Vec<String>,
    pub collapse_empty_inline: bool,
    pub collapsible_inline_tags: Vec<String>,
    pub max_depth: usize,
    /// Tag name, or `*` for every tag, to the attributes it may carry.
    pub allowed_attributes: BTreeMap<String, Vec<String>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            allowed_tags: default::strings(default::ALLOWED_TAGS),
            allowed_content_tags: default::strings(default::ALLOWED_CONTENT_TAGS),
            content_container: default::CONTENT_CONTAINER.to_string(),
            allowed_css_properties: default::strings(default::ALLOWED_CSS_PROPERTIES),
            allowed_uri_schemes: default::strings(default::ALLOWED_URI_SCHEMES),
            uri_attributes: default::strings(default::URI_ATTRIBUTES),
            collapse_empty_inline: true,
            collapsible_inline_tags: default::strings(default::COLLAPSIBLE_INLINE_TAGS),
            max_depth: default::MAX_DEPTH,
            allowed_attributes: default::allowed_attributes(),
        }
    }
}

impl PolicyConfig {
    pub fn from_toml_str(source: &str) -> Result<PolicyConfig> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<PolicyConfig> {
        debug!("loading policy from {}", path.display());
        let source = fs::read_to_string(path)?;
        PolicyConfig::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        let names = self
            .allowed_tags
            .iter()
            .chain(&self.allowed_content_tags)
            .chain(&self.allowed_css_properties)
            .chain(&self.uri_attributes)
            .chain(&self.collapsible_inline_tags)
            .chain(self.allowed_attributes.keys())
            .chain(self.allowed_attributes.values().flatten())
            .chain(std::iter::once(&self.content_container));
        for name in names {
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(Error::InvalidTag(name.clone()));
            }
        }

        if let Some(scheme) = self
            .allowed_uri_schemes
            .iter()
            .find(|scheme| !scheme.ends_with(':') || scheme.len() < 2)
        {
            return Err(Error::InvalidScheme(scheme.clone()));
        }

        if self.max_depth == 0 {
            return Err(Error::InvalidDepth);
        }

        Ok(())
    }
}

/// The compiled, immutable allow-list consulted by the sanitizers.
///
/// Built once (see [`DEFAULT_POLICY`](crate::DEFAULT_POLICY)) and shared
/// read-only between any number of concurrent sanitize calls.
#[derive(Debug, Clone)]
pub struct Policy {
    config: PolicyConfig,
    tags: HashSet<LocalName>,
    content_tags: HashSet<LocalName>,
    container: LocalName,
    attributes: HashMap<LocalName, HashSet<LocalName>>,
    global_attributes: HashSet<LocalName>,
    css_properties: HashSet<String>,
    uri_schemes: Vec<String>,
    uri_attributes: HashSet<LocalName>,
    collapsible_inline_tags: HashSet<LocalName>,
}

fn atoms<'a>(names: impl IntoIterator<Item = &'a String>) -> HashSet<LocalName> {
    names
        .into_iter()
        .map(|name| LocalName::from(name.to_ascii_lowercase()))
        .collect()
}

impl Default for Policy {
    fn default() -> Self {
        Policy::compile(PolicyConfig::default())
    }
}

impl Policy {
    pub fn from_config(config: PolicyConfig) -> Result<Policy> {
        config.validate()?;
        Ok(Policy::compile(config))
    }

    fn compile(config: PolicyConfig) -> Policy {
        let attributes = config
            .allowed_attributes
            .iter()
            .filter(|(tag, _)| tag.as_str() != "*")
            .map(|(tag, names)| (LocalName::from(tag.to_ascii_lowercase()), atoms(names)))
            .collect();
        let global_attributes = config
            .allowed_attributes
            .get("*")
            .map(|names| atoms(names))
            .unwrap_or_default();

        Policy {
            tags: atoms(&config.allowed_tags),
            content_tags: atoms(&config.allowed_content_tags),
            container: LocalName::from(config.content_container.to_ascii_lowercase()),
            attributes,
            global_attributes,
            css_properties: config
                .allowed_css_properties
                .iter()
                .map(|property| property.to_ascii_lowercase())
                .collect(),
            uri_schemes: config
                .allowed_uri_schemes
                .iter()
                .map(|scheme| scheme.to_ascii_lowercase())
                .collect(),
            uri_attributes: atoms(&config.uri_attributes),
            collapsible_inline_tags: if config.collapse_empty_inline {
                atoms(&config.collapsible_inline_tags)
            } else {
                HashSet::new()
            },
            config,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn allowed_tags(&self) -> &[String] {
        &self.config.allowed_tags
    }

    pub fn allowed_attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.config.allowed_attributes
    }

    pub fn allowed_css_properties(&self) -> &[String] {
        &self.config.allowed_css_properties
    }

    pub fn allowed_uri_schemes(&self) -> &[String] {
        &self.config.allowed_uri_schemes
    }

    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    pub fn container(&self) -> &LocalName {
        &self.container
    }

    pub fn is_allowed_tag(&self, tag: &LocalName) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_content_tag(&self, tag: &LocalName) -> bool {
        self.content_tags.contains(tag)
    }

    /// `true` when `attribute` is listed for `tag` or for every tag (`*`).
    pub fn allows_attribute(&self, tag: &LocalName, attribute: &LocalName) -> bool {
        self.global_attributes.contains(attribute)
            || self
                .attributes
                .get(tag)
                .map(|names| names.contains(attribute))
                .unwrap_or(false)
    }

    pub fn allows_css_property(&self, property: &str) -> bool {
        self.css_properties.contains(property)
    }

    pub fn is_uri_attribute(&self, attribute: &LocalName) -> bool {
        self.uri_attributes.contains(attribute)
    }

    /// Values without a `:` are relative references and always pass.
    /// Anything else has to start with one of the allowed schemes.
    pub fn allows_uri(&self, value: &str) -> bool {
        if !value.contains(':') {
            return true;
        }
        let value = value.trim_start_matches(|c: char| c.is_ascii_whitespace() || c.is_control());
        self.uri_schemes.iter().any(|scheme| {
            value
                .get(..scheme.len())
                .map(|prefix| prefix.eq_ignore_ascii_case(scheme))
                .unwrap_or(false)
        })
    }

    pub fn collapses_when_empty(&self, tag: &LocalName) -> bool {
        self.collapsible_inline_tags.contains(tag)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_policy_tables() {
        let policy = Policy::default();
        assert!(policy.allowed_tags().iter().any(|tag| tag == "p"));
        assert!(policy.allowed_tags().iter().any(|tag| tag == "div"));
        assert_eq!(
            policy.allowed_attributes()["*"],
            vec!["id", "title", "class", "style"]
        );
        assert_eq!(
            policy.allowed_attributes()["a"],
            vec!["href", "alt", "title", "target", "rel"]
        );
        assert_eq!(
            policy.allowed_uri_schemes(),
            &["http:", "https:", "data:", "file:", "ftp:", "mailto:"]
        );
        assert!(policy
            .allowed_css_properties()
            .iter()
            .any(|property| property == "background-color"));
    }

    #[test]
    fn wildcard_attributes_apply_to_every_tag() {
        let policy = Policy::default();
        assert!(policy.allows_attribute(&local_name!("p"), &local_name!("class")));
        assert!(policy.allows_attribute(&local_name!("a"), &local_name!("href")));
        assert!(!policy.allows_attribute(&local_name!("p"), &local_name!("href")));
        assert!(!policy.allows_attribute(&local_name!("img"), &LocalName::from("onerror")));
    }

    #[test]
    fn uri_scheme_rules() {
        let policy = Policy::default();
        assert!(policy.allows_uri("https://example.com"));
        assert!(policy.allows_uri("HTTPS://example.com"));
        assert!(policy.allows_uri("/relative/path"));
        assert!(policy.allows_uri("mailto:someone@example.com"));
        assert!(!policy.allows_uri("javascript:alert(1)"));
        assert!(!policy.allows_uri(" javascript:alert(1)"));
        assert!(!policy.allows_uri("vbscript:msgbox"));
        assert!(!policy.allows_uri("m-files://view"));
    }

    #[test]
    fn custom_schemes_come_from_config() {
        let config = PolicyConfig::from_toml_str(
            r#"allowed_uri_schemes = ["https:", "m-files:", "pw:"]"#,
        )
        .unwrap();
        let policy = Policy::from_config(config).unwrap();
        assert!(policy.allows_uri("m-files://view/1"));
        assert!(policy.allows_uri("pw:item"));
        assert!(!policy.allows_uri("http://example.com"));
        // Untouched fields keep their defaults.
        assert!(policy.is_allowed_tag(&local_name!("span")));
    }

    #[test]
    fn attribute_tables_parse_from_toml() {
        let config = PolicyConfig::from_toml_str(
            r#"
            [allowed_attributes]
            "*" = ["class"]
            A = ["HREF"]
            "#,
        )
        .unwrap();
        let policy = Policy::from_config(config).unwrap();
        assert!(policy.allows_attribute(&local_name!("a"), &local_name!("href")));
        assert!(!policy.allows_attribute(&local_name!("a"), &local_name!("title")));
    }

    #[test]
    fn rejects_invalid_configs() {
        let mut config = PolicyConfig::default();
        config.allowed_uri_schemes.push("https".to_string());
        assert!(matches!(
            Policy::from_config(config),
            Err(Error::InvalidScheme(_))
        ));

        let mut config = PolicyConfig::default();
        config.max_depth = 0;
        assert!(matches!(Policy::from_config(config), Err(Error::InvalidDepth)));

        let mut config = PolicyConfig::default();
        config.content_container = " ".to_string();
        assert!(matches!(Policy::from_config(config), Err(Error::InvalidTag(_))));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = PolicyConfig::default();
        let source = config.to_toml_string().unwrap();
        assert_eq!(PolicyConfig::from_toml_str(&source).unwrap(), config);
    }

    #[test]
    fn collapse_can_be_disabled() {
        let config = PolicyConfig {
            collapse_empty_inline: false,
            ..Default::default()
        };
        let policy = Policy::from_config(config).unwrap();
        assert!(!policy.collapses_when_empty(&local_name!("span")));
        assert!(Policy::default().collapses_when_empty(&local_name!("span")));
    }
}
