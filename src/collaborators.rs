//! I/O collaborator interfaces (spec §6 "I/O collaborators", "Map
//! interface"). Concrete detection logic — DNS blocklists, HTTP
//! reputation lookups, Redis-backed counters — is deliberately out of
//! scope (spec §1); these traits are the seam a [`crate::scheduler`]
//! callback reaches through, plus deterministic in-memory doubles for
//! tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// A resolved DNS answer or a resolution failure, delivered to the
/// callback passed to [`DnsResolver::resolve`].
pub type DnsCallback = Box<dyn FnOnce(Result<Vec<String>, String>) + Send>;

/// `resolve(type, name, timeout, cb)` (spec §6). A real implementation
/// dispatches off-thread and eventually calls back into the owning
/// symbol's [`crate::scheduler::SymbolCallback::on_continuation`] via
/// [`crate::scheduler::TaskScheduler::finalize`]; the in-memory double here
/// calls back synchronously, which is indistinguishable from the
/// scheduler's point of view (spec §9: "correctness depends only on the
/// start/finalize exactly-once guarantee").
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, record_type: &str, name: &str, timeout: Duration, cb: DnsCallback);
}

/// A static DNS fixture keyed by `(record_type, name)`.
#[derive(Default)]
pub struct StaticDnsResolver {
    records: HashMap<(String, String), Vec<String>>,
}

impl StaticDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record_type: impl Into<String>, name: impl Into<String>, values: Vec<String>) -> Self {
        self.records.insert((record_type.into(), name.into()), values);
        self
    }
}

impl DnsResolver for StaticDnsResolver {
    fn resolve(&self, record_type: &str, name: &str, _timeout: Duration, cb: DnsCallback) {
        let key = (record_type.to_string(), name.to_string());
        let result = self
            .records
            .get(&key)
            .cloned()
            .ok_or_else(|| format!("NXDOMAIN: {record_type} {name}"));
        cb(result);
    }
}

/// An HTTP response delivered to the callback passed to
/// [`HttpClient::request`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub type HttpCallback = Box<dyn FnOnce(Result<HttpResponse, String>) + Send>;

/// `request(method, url, headers, body, max_size, timeout, cb)` (spec §6).
pub trait HttpClient: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn request(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
        max_size: usize,
        timeout: Duration,
        cb: HttpCallback,
    );
}

/// A static HTTP fixture keyed by `"METHOD url"`.
#[derive(Default)]
pub struct StaticHttpClient {
    responses: HashMap<String, HttpResponse>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, method: impl Into<String>, url: impl Into<String>, response: HttpResponse) -> Self {
        self.responses.insert(format!("{} {}", method.into(), url.into()), response);
        self
    }
}

impl HttpClient for StaticHttpClient {
    fn request(&self, method: &str, url: &str, _headers: &[(String, String)], _body: &[u8], max_size: usize, _timeout: Duration, cb: HttpCallback) {
        let key = format!("{method} {url}");
        let result = match self.responses.get(&key) {
            Some(resp) if resp.body.len() > max_size => Err(format!("response exceeds max_size {max_size}")),
            Some(resp) => Ok(resp.clone()),
            None => Err(format!("no fixture for {key}")),
        };
        cb(result);
    }
}

/// A Redis command reply, delivered to the callback passed to
/// [`RedisClient::command`].
pub type RedisCallback = Box<dyn FnOnce(Result<Option<String>, String>) + Send>;

/// `command(key, write?, args, cb)` (spec §6). Redis connections are
/// pooled per worker and never shared across workers (spec §5); this
/// crate's test double is a single in-process map standing in for that
/// pool.
pub trait RedisClient: Send + Sync {
    fn command(&self, key: &str, write: bool, args: &[String], cb: RedisCallback);
}

/// An in-memory Redis double supporting `GET`/`SET`/`INCR`/`DEL` via `args`.
#[derive(Default)]
pub struct InMemoryRedisClient {
    store: RwLock<HashMap<String, String>>,
}

impl InMemoryRedisClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RedisClient for InMemoryRedisClient {
    fn command(&self, key: &str, write: bool, args: &[String], cb: RedisCallback) {
        let op = args.first().map(String::as_str).unwrap_or("GET");
        let result = match op {
            "GET" => Ok(self.store.read().unwrap().get(key).cloned()),
            "SET" if write => {
                let value = args.get(1).cloned().unwrap_or_default();
                self.store.write().unwrap().insert(key.to_string(), value.clone());
                Ok(Some(value))
            }
            "INCR" if write => {
                let mut guard = self.store.write().unwrap();
                let current: i64 = guard.get(key).and_then(|v| v.parse().ok()).unwrap_or(0);
                let next = current + 1;
                guard.insert(key.to_string(), next.to_string());
                Ok(Some(next.to_string()))
            }
            "DEL" if write => {
                self.store.write().unwrap().remove(key);
                Ok(None)
            }
            other => Err(format!("unsupported or read-only command '{other}' for key '{key}'")),
        };
        cb(result);
    }
}

/// The read-only map interface (spec §6 "Map interface"): `get(key) ->
/// value|null`, `get_key(key) -> bool`, `reload()`.
pub trait MapSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn get_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
    fn reload(&self) -> Result<(), String>;
}

/// An in-memory map with no backing file; `reload` is a no-op.
#[derive(Default)]
pub struct InMemoryMapSource {
    entries: HashMap<String, String>,
}

impl InMemoryMapSource {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

impl MapSource for InMemoryMapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn reload(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A file-backed map, one `key value` pair per line. `reload` re-reads the
/// file; on error the previous value is retained (spec §7 `MapLoadError`:
/// "previous value retained; alert logged").
pub struct FileMapSource {
    path: std::path::PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileMapSource {
    pub fn load(path: impl Into<std::path::PathBuf>) -> Result<Self, String> {
        let path = path.into();
        let entries = Self::read_entries(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn read_entries(path: &std::path::Path) -> Result<HashMap<String, String>, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Ok(contents
            .lines()
            .filter_map(|line| line.split_once(' '))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }
}

impl MapSource for FileMapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn reload(&self) -> Result<(), String> {
        match Self::read_entries(&self.path) {
            Ok(fresh) => {
                *self.entries.write().unwrap() = fresh;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "map reload failed, keeping previous value");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_dns_resolves_known_record() {
        let resolver = StaticDnsResolver::new().with_record("A", "example.com", vec!["1.2.3.4".into()]);
        let mut captured = None;
        resolver.resolve("A", "example.com", Duration::from_secs(1), Box::new(|r| captured = Some(r)));
        assert_eq!(captured.unwrap().unwrap(), vec!["1.2.3.4".to_string()]);
    }

    #[test]
    fn static_dns_errors_on_unknown_name() {
        let resolver = StaticDnsResolver::new();
        let mut captured = None;
        resolver.resolve("A", "nowhere.invalid", Duration::from_secs(1), Box::new(|r| captured = Some(r)));
        assert!(captured.unwrap().is_err());
    }

    #[test]
    fn in_memory_redis_get_set_incr() {
        let redis = InMemoryRedisClient::new();
        let mut out = None;
        redis.command("counter", true, &["SET".into(), "1".into()], Box::new(|r| out = Some(r)));
        assert_eq!(out.unwrap().unwrap(), Some("1".to_string()));

        let mut out = None;
        redis.command("counter", true, &["INCR".into()], Box::new(|r| out = Some(r)));
        assert_eq!(out.unwrap().unwrap(), Some("2".to_string()));
    }

    #[test]
    fn in_memory_redis_rejects_write_without_flag() {
        let redis = InMemoryRedisClient::new();
        let mut out = None;
        redis.command("k", false, &["SET".into(), "v".into()], Box::new(|r| out = Some(r)));
        assert!(out.unwrap().is_err());
    }

    #[test]
    fn in_memory_map_get_key_reflects_presence() {
        let map = InMemoryMapSource::new([("spammy.com".to_string(), "1".to_string())].into_iter().collect());
        assert!(map.get_key("spammy.com"));
        assert!(!map.get_key("clean.com"));
    }
}
