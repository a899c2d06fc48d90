pub mod base;
pub mod eagle_bar_json;
pub mod frolic_html;
pub mod sf_dog_html;
pub mod time;
pub mod transform1060_html;

use crate::models::Event;

/// One site the pipeline pulls events from.
///
/// `fetch` returns normalized events without a `source` tag; the aggregator
/// adds it. Errors are contained by the aggregator, so an implementation may
/// simply propagate them.
pub trait EventSource: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn source_name(&self) -> &'static str;
    fn source_url(&self) -> &'static str;
    fn fetch(&self) -> anyhow::Result<Vec<Event>>;
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl SourceInfo {
    pub fn of(source: &dyn EventSource) -> Self {
        Self {
            id: source.source_id().to_string(),
            name: source.source_name().to_string(),
            url: source.source_url().to_string(),
        }
    }
}

/// Every source the binary runs. New sites are added here only.
pub fn registered_sources() -> Vec<Box<dyn EventSource>> {
    vec![
        Box::new(sf_dog_html::SfDog),
        Box::new(frolic_html::Frolic),
        Box::new(transform1060_html::Transform1060),
        Box::new(eagle_bar_json::EagleBar),
    ]
}

pub fn list_sources() -> Vec<SourceInfo> {
    registered_sources()
        .iter()
        .map(|source| SourceInfo::of(source.as_ref()))
        .collect()
}

/// Narrows the registry to one source id.
pub fn select_source(id: &str) -> anyhow::Result<Vec<Box<dyn EventSource>>> {
    let source = registered_sources()
        .into_iter()
        .find(|source| source.source_id() == id)
        .ok_or_else(|| anyhow::anyhow!("unknown source id: {id}"))?;
    Ok(vec![source])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_unique() {
        let mut ids: Vec<String> = list_sources().into_iter().map(|info| info.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(total, 4);
    }

    #[test]
    fn select_source_rejects_unknown_ids() {
        assert!(select_source("frolic").is_ok());
        let err = select_source("nowhere").err().expect("unknown id fails");
        assert!(err.to_string().contains("nowhere"));
    }
}
