use std::collections::BTreeMap;

/// One page of one entity to fetch during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub entity: String,
    pub page: u32,
    pub url: String,
}

/// Expands `entities x [1..=pages]` into fetch targets.
///
/// `entities` maps a display name to the key used in the URL. The URL is
/// `{base_url}/{key}/?page={page}`. An empty map or `pages == 0` yields no
/// targets.
pub fn generate_targets(
    entities: &BTreeMap<String, String>,
    pages: u32,
    base_url: &str,
) -> Vec<FetchTarget> {
    let base = base_url.trim_end_matches('/');
    let mut targets = Vec::with_capacity(entities.len() * pages as usize);
    for (entity, key) in entities {
        for page in 1..=pages {
            targets.push(FetchTarget {
                entity: entity.clone(),
                page,
                url: format!("{base}/{key}/?page={page}"),
            });
        }
    }
    targets
}
