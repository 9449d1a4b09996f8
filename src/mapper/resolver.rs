//! Resolution of `(name?, id?)` requests into `{id, name}` pairs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::registry::{Registry, RegistryError};
use crate::util::sanitize::{lowercase, sanitize_conference_name};

use super::allocator::{AllocateError, IdAllocator};

/// Raw request as the dial-in bridge sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default, rename = "conference")]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl ResolveRequest {
    pub fn by_name(name: impl Into<String>) -> Self { Self { name: Some(name.into()), id: None } }

    pub fn by_id(id: impl Into<String>) -> Self { Self { name: None, id: Some(id.into()) } }
}

/// Resolved pair. `id == 0` and an empty name mean "not resolved".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub id: u64,
    #[serde(rename = "conference")]
    pub name: String,
}

#[derive(thiserror::Error, Debug)]
enum ResolveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Allocate(#[from] AllocateError),
}

pub struct ConferenceMapper<R> {
    registry: Arc<R>,
    allocator: IdAllocator,
}

impl<R: Registry> ConferenceMapper<R> {
    pub fn new(registry: Arc<R>, config: &Config) -> Self {
        Self::with_allocator(registry, IdAllocator::from_config(config))
    }

    pub fn with_allocator(registry: Arc<R>, allocator: IdAllocator) -> Self {
        Self { registry, allocator }
    }

    pub fn registry(&self) -> &Arc<R> { &self.registry }

    /// Resolve a request, never failing.
    ///
    /// A known id wins over the name. Otherwise the sanitized name is looked
    /// up and allocated on a miss. Malformed ids count as absent; storage
    /// failures are logged and whatever was resolved so far is returned.
    pub fn resolve(&self, request: &ResolveRequest) -> Resolution {
        let name = request.name.as_deref().filter(|n| !n.is_empty());
        let id = request.id.as_deref().and_then(parse_id).unwrap_or(0);
        let mut result = Resolution { id, ..Default::default() };

        tracing::info!(
            conference = ?name.map(urlencoding::encode),
            id = result.id,
            "resolving conference"
        );

        if let Err(err) = self.resolve_into(&mut result, name) {
            tracing::error!(
                conference = ?name,
                id = result.id,
                %err,
                "conference resolution aborted"
            );
            return result;
        }

        if result.id != 0 {
            if let Err(err) = self.registry.touch(result.id) {
                tracing::error!(id = result.id, %err, "could not record conference usage");
            }
        }

        tracing::info!(id = result.id, conference = %result.name, "conference resolved");
        result
    }

    fn resolve_into(
        &self,
        result: &mut Resolution,
        name: Option<&str>,
    ) -> Result<(), ResolveError> {
        if result.id != 0 {
            match self.registry.find_name_by_id(result.id)? {
                Some(stored) => result.name = lowercase(&stored),
                None => tracing::debug!(id = result.id, "unknown conference id"),
            }
        }

        if let Some(raw) = name.filter(|_| result.name.is_empty()) {
            let canonical = sanitize_conference_name(raw);
            result.id = self.id_for_name(&canonical)?;
            result.name = canonical;
        }
        Ok(())
    }

    fn id_for_name(&self, name: &str) -> Result<u64, ResolveError> {
        if let Some(id) = self.registry.find_id_by_name(name)? {
            return Ok(id);
        }
        match self.allocator.allocate(&*self.registry, name) {
            Ok(id) => {
                tracing::info!(conference = %name, id, "allocated conference id");
                Ok(id)
            }
            // Lost a race against a concurrent request for the same name.
            Err(AllocateError::NameTaken) => {
                let id = self.registry.find_id_by_name(name)?;
                id.ok_or(ResolveError::Allocate(AllocateError::NameTaken))
            }
            Err(err) => Err(err.into()),
        }
    }
}

// Ids are unsigned like every allocated PIN, so a negative id can never
// match a row and is treated as malformed instead of being echoed back.
fn parse_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(id = raw, %err, "ignoring malformed conference id");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Column, SqliteRegistry};
    use crate::util::id::IdSpace;
    use parking_lot::Mutex;
    use time::{Duration, OffsetDateTime};

    fn mapper() -> ConferenceMapper<SqliteRegistry> {
        let registry = Arc::new(SqliteRegistry::open_in_memory().unwrap());
        ConferenceMapper::new(registry, &Config::default())
    }

    fn request(name: &str, id: &str) -> ResolveRequest {
        ResolveRequest { name: Some(name.into()), id: Some(id.into()) }
    }

    #[test]
    fn new_name_is_allocated_once() {
        let mapper = mapper();
        let first = mapper.resolve(&ResolveRequest::by_name("thisIsATest@test.example.com"));
        assert_eq!(first.name, "thisisatest@test.example.com");
        assert!(IdSpace::default().contains(first.id));

        let again = mapper.resolve(&ResolveRequest::by_name("THISISATEST@test.example.com"));
        assert_eq!(again, first);
        assert_eq!(mapper.registry().len().unwrap(), 1);
    }

    #[test]
    fn existing_name_reuses_stored_id() {
        let mapper = mapper();
        mapper.registry().insert("thisisatest@test.example.com", 12553).unwrap();

        let got = mapper.resolve(&ResolveRequest::by_name("thisIsATest@test.example.com"));
        assert_eq!(got, Resolution { id: 12553, name: "thisisatest@test.example.com".into() });
    }

    #[test]
    fn id_takes_precedence_over_name() {
        let mapper = mapper();
        mapper.registry().insert("testroom@test.example.com", 12553).unwrap();

        let got = mapper.resolve(&request("test@example.com", "12553"));
        assert_eq!(got, Resolution { id: 12553, name: "testroom@test.example.com".into() });
        assert_eq!(mapper.registry().find_id_by_name("test@example.com").unwrap(), None);
    }

    #[test]
    fn unknown_id_echoes_id_with_empty_name() {
        let mapper = mapper();
        let got = mapper.resolve(&ResolveRequest::by_id("01234"));
        assert_eq!(got, Resolution { id: 1234, name: String::new() });
        assert!(mapper.registry().is_empty().unwrap());
    }

    #[test]
    fn unknown_id_falls_back_to_name() {
        let mapper = mapper();
        let got = mapper.resolve(&request("room@x.org", "1234"));
        assert_eq!(got.name, "room@x.org");
        assert_ne!(got.id, 1234);
        assert_eq!(mapper.registry().find_id_by_name("room@x.org").unwrap(), Some(got.id));
    }

    #[test]
    fn stored_name_is_lowercased_on_id_lookup() {
        let mapper = mapper();
        mapper.registry().insert("room@Example.COM", 5550001).unwrap();
        let got = mapper.resolve(&ResolveRequest::by_id("5550001"));
        assert_eq!(got.name, "room@example.com");

        mapper.registry().insert("room@ΟΔΟΣ.example", 5550002).unwrap();
        let got = mapper.resolve(&ResolveRequest::by_id("5550002"));
        assert_eq!(got.name, "room@οδοσ.example");
    }

    #[test]
    fn negative_id_is_malformed_not_echoed() {
        let mapper = mapper();
        let got = mapper.resolve(&request("room@x.org", "-5"));
        assert_eq!(got.name, "room@x.org");
        assert!(IdSpace::default().contains(got.id));
    }

    #[test]
    fn malformed_id_counts_as_absent() {
        let mapper = mapper();
        assert_eq!(mapper.resolve(&ResolveRequest::by_id("12ab")), Resolution::default());
        assert_eq!(mapper.resolve(&ResolveRequest::by_id("-5")), Resolution::default());

        let got = mapper.resolve(&request("room@x.org", "not-a-number"));
        assert_eq!(got.name, "room@x.org");
        assert!(IdSpace::default().contains(got.id));
    }

    #[test]
    fn empty_request_resolves_nothing() {
        let mapper = mapper();
        assert_eq!(mapper.resolve(&ResolveRequest::default()), Resolution::default());
        assert_eq!(mapper.resolve(&request("", "")), Resolution::default());
        assert_eq!(mapper.resolve(&ResolveRequest::by_id("0")), Resolution::default());
    }

    #[test]
    fn resolution_touches_entry() {
        let mapper = mapper();
        mapper.registry().insert("room@x.org", 3000003).unwrap();
        let old = OffsetDateTime::now_utc() - Duration::days(100);
        mapper.registry().touch_at(3000003, old).unwrap();

        mapper.resolve(&ResolveRequest::by_id("3000003"));
        let after_id = mapper.registry().entry(3000003).unwrap().unwrap().last_used;
        assert!(after_id > old);

        mapper.registry().touch_at(3000003, old).unwrap();
        mapper.resolve(&ResolveRequest::by_name("room@x.org"));
        let after_name = mapper.registry().entry(3000003).unwrap().unwrap().last_used;
        assert!(after_name > old);
    }

    /// Registry that fails or races in scripted ways.
    #[derive(Default)]
    struct Flaky {
        fail_name_lookup: bool,
        racing_id: Mutex<Option<u64>>,
        touched: Mutex<Vec<u64>>,
    }

    impl Registry for Flaky {
        fn find_id_by_name(&self, _: &str) -> Result<Option<u64>, RegistryError> {
            if self.fail_name_lookup {
                return Err(RegistryError::Storage(rusqlite::Error::InvalidQuery));
            }
            Ok(*self.racing_id.lock())
        }
        fn find_name_by_id(&self, _: u64) -> Result<Option<String>, RegistryError> { Ok(None) }
        fn insert(&self, _: &str, _: u64) -> Result<(), RegistryError> {
            *self.racing_id.lock() = Some(4444444);
            Err(RegistryError::Conflict(Column::Name))
        }
        fn touch(&self, id: u64) -> Result<bool, RegistryError> {
            self.touched.lock().push(id);
            Ok(true)
        }
        fn delete_older_than(&self, _: OffsetDateTime) -> Result<usize, RegistryError> { Ok(0) }
    }

    #[test]
    fn concurrent_allocation_uses_winning_id() {
        let mapper = ConferenceMapper::new(Arc::new(Flaky::default()), &Config::default());
        let got = mapper.resolve(&ResolveRequest::by_name("room@x.org"));
        assert_eq!(got, Resolution { id: 4444444, name: "room@x.org".into() });
        assert_eq!(*mapper.registry().touched.lock(), vec![4444444]);
    }

    #[test]
    fn storage_failure_returns_partial_result() {
        let registry = Flaky { fail_name_lookup: true, ..Default::default() };
        let mapper = ConferenceMapper::new(Arc::new(registry), &Config::default());

        let got = mapper.resolve(&request("room@x.org", "1234"));
        assert_eq!(got, Resolution { id: 1234, name: String::new() });
        assert!(mapper.registry().touched.lock().is_empty());
    }
}
