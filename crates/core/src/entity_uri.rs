//! Identifying an entity from the URI it is served at.

use std::fmt;

use crate::error::EntityUriError;

/// An entity URI together with the entity id derived from it.
///
/// The id is taken from the last path segment. An OData key segment
/// (`Jobs(42)` or `Jobs('a-1')`) yields the key; any other segment is used
/// as-is. Without a path, an authority in key form (`mem://Jobs(1)`) yields
/// its key. Query strings and fragments are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityUri {
    uri: String,
    entity_id: String,
}

impl EntityUri {
    pub fn parse(raw: &str) -> Result<Self, EntityUriError> {
        let uri = raw.trim();
        if uri.is_empty() {
            return Err(EntityUriError::Empty);
        }
        let entity_id = derive_entity_id(uri).ok_or_else(|| EntityUriError::MissingEntityId {
            uri: uri.to_string(),
        })?;
        Ok(EntityUri {
            uri: uri.to_string(),
            entity_id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

impl fmt::Display for EntityUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

fn derive_entity_id(uri: &str) -> Option<String> {
    let without_fragment = uri.split('#').next().unwrap_or(uri);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => match rest.split_once('/') {
            Some((_, path)) => path,
            // A bare authority only names an entity in key form: `mem://Jobs(1)`.
            None => {
                return odata_key(rest)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            }
        },
        None => without_query,
    };
    let segment = path.rsplit('/').find(|s| !s.is_empty())?;

    let id = odata_key(segment).unwrap_or(segment);
    (!id.is_empty()).then(|| id.to_string())
}

/// The key of an OData key segment (`Jobs(42)`, `Orders('a-1')`).
fn odata_key(segment: &str) -> Option<&str> {
    let open = segment.find('(')?;
    let inner = segment.strip_suffix(')')?;
    let key = inner.get(open + 1..)?;
    Some(
        key.strip_prefix('\'')
            .and_then(|k| k.strip_suffix('\''))
            .unwrap_or(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> String {
        EntityUri::parse(raw).unwrap().entity_id().to_string()
    }

    #[test]
    fn odata_numeric_key() {
        assert_eq!(id("http://host/api/Core.svc/Jobs(42)"), "42");
    }

    #[test]
    fn odata_quoted_key() {
        assert_eq!(id("https://host/odata/Orders('a-1')"), "a-1");
    }

    #[test]
    fn plain_last_segment() {
        assert_eq!(id("http://host/jobs/17/"), "17");
        assert_eq!(id("http://host/jobs/17?expand=all#top"), "17");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let uri = EntityUri::parse("  http://host/Jobs(1) ").unwrap();
        assert_eq!(uri.as_str(), "http://host/Jobs(1)");
    }

    #[test]
    fn empty_uri_is_rejected() {
        assert_eq!(EntityUri::parse("").unwrap_err(), EntityUriError::Empty);
        assert_eq!(EntityUri::parse("   ").unwrap_err(), EntityUriError::Empty);
    }

    #[test]
    fn key_segment_as_authority() {
        assert_eq!(id("mem://Jobs(1)"), "1");
        assert_eq!(id("mem://Orders('a-1')?x=1"), "a-1");
    }

    #[test]
    fn host_only_uri_has_no_id() {
        assert!(matches!(
            EntityUri::parse("http://host/").unwrap_err(),
            EntityUriError::MissingEntityId { .. }
        ));
        assert!(matches!(
            EntityUri::parse("http://host").unwrap_err(),
            EntityUriError::MissingEntityId { .. }
        ));
        assert!(matches!(
            EntityUri::parse("http://host/Jobs()").unwrap_err(),
            EntityUriError::MissingEntityId { .. }
        ));
    }
}
